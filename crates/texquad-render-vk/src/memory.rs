use anyhow::{anyhow, bail, Context, Result};
use ash::vk;
use std::rc::Rc;

use crate::context::DeviceContext;
use crate::one_shot;

/// First memory type allowed by `type_bits` that has all of `required`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32)).find(|&i| {
        type_bits & (1 << i) != 0
            && props.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

pub unsafe fn allocate(
    ctx: &DeviceContext,
    req: vk::MemoryRequirements,
    props: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(&ctx.memory_props, req.memory_type_bits, props)
        .ok_or_else(|| anyhow!("no memory type with {props:?}"))?;
    let info = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index,
        ..Default::default()
    };
    ctx.device
        .allocate_memory(&info, None)
        .context("allocate_memory")
}

/// Buffer plus its dedicated allocation. Optionally kept mapped.
pub struct GpuBuffer {
    ctx: Rc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: *mut u8,
}

impl GpuBuffer {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        props: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = ctx
            .device
            .create_buffer(&info, None)
            .context("create_buffer")?;

        let mut this = Self {
            ctx: Rc::clone(ctx),
            buffer,
            memory: vk::DeviceMemory::null(),
            size,
            mapped: std::ptr::null_mut(),
        };
        let req = ctx.device.get_buffer_memory_requirements(buffer);
        this.memory = allocate(ctx, req, props)?;
        ctx.device
            .bind_buffer_memory(buffer, this.memory, 0)
            .context("bind_buffer_memory")?;
        Ok(this)
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Maps the whole allocation until drop. Host-visible memory only.
    pub unsafe fn map(&mut self) -> Result<()> {
        if self.mapped.is_null() {
            let ptr = self
                .ctx
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .context("map_memory")?;
            self.mapped = ptr.cast();
        }
        Ok(())
    }

    /// Copies `bytes` to the start of the buffer. Host-coherent memory only.
    pub unsafe fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            bail!(
                "write of {} bytes into {}-byte buffer",
                bytes.len(),
                self.size
            );
        }
        let transient = self.mapped.is_null();
        self.map()?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len());
        if transient {
            self.ctx.device.unmap_memory(self.memory);
            self.mapped = std::ptr::null_mut();
        }
        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            if !self.mapped.is_null() {
                self.ctx.device.unmap_memory(self.memory);
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
            self.ctx.device.free_memory(self.memory, None);
        }
    }
}

/// Host-visible staging buffer already filled with `bytes`.
pub unsafe fn staging_buffer(ctx: &Rc<DeviceContext>, bytes: &[u8]) -> Result<GpuBuffer> {
    let mut staging = GpuBuffer::new(
        ctx,
        bytes.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )
    .context("staging buffer")?;
    staging.write(bytes)?;
    Ok(staging)
}

/// Device-local buffer filled through a staging copy on the graphics queue.
pub unsafe fn upload_device_local(
    ctx: &Rc<DeviceContext>,
    pool: vk::CommandPool,
    usage: vk::BufferUsageFlags,
    bytes: &[u8],
) -> Result<GpuBuffer> {
    let staging = staging_buffer(ctx, bytes)?;
    let dst = GpuBuffer::new(
        ctx,
        staging.size(),
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: staging.size(),
    };
    one_shot::submit(ctx, pool, |device, cmd| {
        unsafe {
            device.cmd_copy_buffer(cmd, staging.raw(), dst.raw(), std::slice::from_ref(&region));
        }
        Ok(())
    })
    .context("copy staging buffer")?;

    Ok(dst)
}
