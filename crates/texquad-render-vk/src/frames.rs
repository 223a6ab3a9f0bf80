use anyhow::{anyhow, Context, Result};
use ash::vk;
use std::mem::size_of;
use std::rc::Rc;
use texquad_math::Transform;

use crate::context::{destroy_descriptor_pool, destroy_fence, destroy_semaphore, DeviceContext, DeviceOwned};
use crate::memory::GpuBuffer;
use crate::pipeline::{TEXTURE_BINDING, UNIFORM_BINDING};
use crate::texture::Texture;

/// Everything one in-flight frame touches. The command buffer and descriptor
/// set go back with their pools.
pub struct FrameSlot {
    pub image_available: DeviceOwned<vk::Semaphore>,
    pub render_finished: DeviceOwned<vk::Semaphore>,
    pub in_flight: DeviceOwned<vk::Fence>,
    pub command_buffer: vk::CommandBuffer,
    pub descriptor_set: vk::DescriptorSet,
    pub uniform: GpuBuffer,
}

pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    _descriptor_pool: DeviceOwned<vk::DescriptorPool>,
}

impl FrameSlots {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        command_pool: vk::CommandPool,
        set_layout: vk::DescriptorSetLayout,
        texture: &Texture,
        count: usize,
    ) -> Result<Self> {
        let n = count as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: n,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: n,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: n,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let descriptor_pool = DeviceOwned::new(
            ctx,
            ctx.device
                .create_descriptor_pool(&pool_info, None)
                .context("create_descriptor_pool")?,
            destroy_descriptor_pool,
        );

        let layouts = vec![set_layout; count];
        let set_info = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: descriptor_pool.raw(),
            descriptor_set_count: n,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = ctx
            .device
            .allocate_descriptor_sets(&set_info)
            .context("allocate_descriptor_sets")?;

        let cmd_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: n,
            ..Default::default()
        };
        let command_buffers = ctx
            .device
            .allocate_command_buffers(&cmd_info)
            .context("allocate_command_buffers")?;

        let mut slots = Vec::with_capacity(count);
        for (command_buffer, descriptor_set) in command_buffers.into_iter().zip(sets) {
            let slot = create_slot(ctx, command_buffer, descriptor_set, texture)
                .with_context(|| format!("frame slot {}", slots.len()))?;
            slots.push(slot);
        }

        Ok(Self {
            slots,
            _descriptor_pool: descriptor_pool,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Result<&FrameSlot> {
        self.slots
            .get(slot)
            .ok_or_else(|| anyhow!("frame slot {slot} out of range"))
    }

    pub fn get_mut(&mut self, slot: usize) -> Result<&mut FrameSlot> {
        self.slots
            .get_mut(slot)
            .ok_or_else(|| anyhow!("frame slot {slot} out of range"))
    }
}

unsafe fn create_slot(
    ctx: &Rc<DeviceContext>,
    command_buffer: vk::CommandBuffer,
    descriptor_set: vk::DescriptorSet,
    texture: &Texture,
) -> Result<FrameSlot> {
    let sem_info = vk::SemaphoreCreateInfo {
        s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
        ..Default::default()
    };
    // signaled so the first wait on a fresh slot returns immediately
    let fence_info = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };
    let image_available = DeviceOwned::new(
        ctx,
        ctx.device.create_semaphore(&sem_info, None)?,
        destroy_semaphore,
    );
    let render_finished = DeviceOwned::new(
        ctx,
        ctx.device.create_semaphore(&sem_info, None)?,
        destroy_semaphore,
    );
    let in_flight = DeviceOwned::new(
        ctx,
        ctx.device.create_fence(&fence_info, None)?,
        destroy_fence,
    );

    let mut uniform = GpuBuffer::new(
        ctx,
        size_of::<Transform>() as vk::DeviceSize,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )
    .context("uniform buffer")?;
    uniform.map()?;

    let buffer_info = vk::DescriptorBufferInfo {
        buffer: uniform.raw(),
        offset: 0,
        range: uniform.size(),
    };
    let image_info = vk::DescriptorImageInfo {
        sampler: texture.sampler(),
        image_view: texture.view(),
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    };
    let writes = [
        vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: descriptor_set,
            dst_binding: UNIFORM_BINDING,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            p_buffer_info: &buffer_info,
            ..Default::default()
        },
        vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: descriptor_set,
            dst_binding: TEXTURE_BINDING,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            p_image_info: &image_info,
            ..Default::default()
        },
    ];
    ctx.device.update_descriptor_sets(&writes, &[]);

    Ok(FrameSlot {
        image_available,
        render_finished,
        in_flight,
        command_buffer,
        descriptor_set,
        uniform,
    })
}
