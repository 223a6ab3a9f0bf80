use anyhow::{anyhow, Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use texquad_math::{Transform, QUAD_INDICES, QUAD_VERTICES};
use texquad_render::{
    AcquireOutcome, PresentBackend, PresentOutcome, RenderError, RenderSize, SwapchainStage,
};
use tracing::{debug, info};

use crate::context::{create_command_pool, DeviceContext, DeviceOwned, InstanceContext};
use crate::frames::FrameSlots;
use crate::memory::{upload_device_local, GpuBuffer};
use crate::pipeline::{
    create_descriptor_set_layout, create_framebuffers, create_pipeline, create_render_pass,
};
use crate::shader::{ShaderCode, ShaderSource, QUAD_FRAG_SPV, QUAD_VERT_SPV};
use crate::swapchain::{create_image_views, create_swapchain, SwapchainPlan};
use crate::texture::{Texture, TexturePixels};

#[derive(Clone, Debug)]
pub struct VkOptions {
    pub frames_in_flight: usize,
    /// Upper bound on swapchain images; raised to the surface minimum if lower.
    pub max_image_count: u32,
    pub clear_color: [f32; 4],
    pub validation: bool,
    /// Checkerboard when unset.
    pub texture: Option<PathBuf>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl Default for VkOptions {
    fn default() -> Self {
        Self {
            frames_in_flight: 4,
            max_image_count: 3,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            validation: cfg!(debug_assertions),
            texture: None,
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

/// Handles that live exactly as long as one swapchain. A null handle means
/// the stage is not built.
struct SwapchainGroup {
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Default for SwapchainGroup {
    fn default() -> Self {
        Self {
            swapchain: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            images: Vec::new(),
            views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
        }
    }
}

/// Vulkan side of the presenter. Owns every GPU object; the swapchain group is
/// built and torn down stage by stage through [`PresentBackend`].
pub struct VkBackend {
    // field order is drop order
    sc: SwapchainGroup,
    frames: FrameSlots,
    texture: Texture,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    set_layout: DeviceOwned<vk::DescriptorSetLayout>,
    command_pool: DeviceOwned<vk::CommandPool>,
    shaders: ShaderCode,
    clear: vk::ClearValue,
    max_image_count: u32,
    ctx: Rc<DeviceContext>,
}

impl VkBackend {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        options: &VkOptions,
    ) -> Result<Self> {
        let shaders = ShaderCode {
            vert: ShaderSource::or_embedded(options.vertex_shader.clone(), QUAD_VERT_SPV)
                .load()
                .context("vertex shader")?,
            frag: ShaderSource::or_embedded(options.fragment_shader.clone(), QUAD_FRAG_SPV)
                .load()
                .context("fragment shader")?,
        };
        let pixels = match &options.texture {
            Some(path) => TexturePixels::load(path)?,
            None => TexturePixels::checkerboard(256, 32),
        };

        let instance = InstanceContext::new(window, display, options.validation)?;
        let ctx = DeviceContext::new(instance)?;

        let command_pool = create_command_pool(&ctx)?;
        let set_layout = create_descriptor_set_layout(&ctx)?;
        unsafe {
            let vertex_buffer = upload_device_local(
                &ctx,
                command_pool.raw(),
                vk::BufferUsageFlags::VERTEX_BUFFER,
                bytemuck::cast_slice(&QUAD_VERTICES),
            )
            .context("vertex buffer")?;
            let index_buffer = upload_device_local(
                &ctx,
                command_pool.raw(),
                vk::BufferUsageFlags::INDEX_BUFFER,
                bytemuck::cast_slice(&QUAD_INDICES),
            )
            .context("index buffer")?;
            let texture = Texture::upload(&ctx, command_pool.raw(), &pixels)?;
            let frames = FrameSlots::new(
                &ctx,
                command_pool.raw(),
                set_layout.raw(),
                &texture,
                options.frames_in_flight.max(1),
            )?;
            info!("vulkan backend ready, {} frames in flight", frames.len());

            Ok(Self {
                sc: SwapchainGroup::default(),
                frames,
                texture,
                vertex_buffer,
                index_buffer,
                set_layout,
                command_pool,
                shaders,
                clear: vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: options.clear_color,
                    },
                },
                max_image_count: options.max_image_count,
                ctx,
            })
        }
    }

    unsafe fn build_swapchain(&mut self, size: RenderSize) -> Result<()> {
        let support = self.ctx.surface_support()?;
        let plan = SwapchainPlan::new(&support, size, self.max_image_count)?;
        let (swapchain, images) = create_swapchain(&self.ctx, &plan)?;
        self.sc.swapchain = swapchain;
        self.sc.format = plan.format.format;
        self.sc.extent = plan.extent;
        self.sc.images = images;
        Ok(())
    }

    unsafe fn record(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        set: vk::DescriptorSet,
    ) -> Result<()> {
        let d = &self.ctx.device;
        d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
            .context("reset_command_buffer")?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        d.begin_command_buffer(cmd, &begin)
            .context("begin_command_buffer")?;

        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.sc.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.sc.extent,
            },
            clear_value_count: 1,
            p_clear_values: &self.clear,
            ..Default::default()
        };
        d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
        d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.sc.pipeline);
        d.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.raw()], &[0]);
        d.cmd_bind_index_buffer(cmd, self.index_buffer.raw(), 0, vk::IndexType::UINT16);
        d.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.sc.pipeline_layout,
            0,
            &[set],
            &[],
        );
        d.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);
        d.cmd_end_render_pass(cmd);

        d.end_command_buffer(cmd).context("end_command_buffer")?;
        Ok(())
    }
}

/// Nanoseconds for a Vulkan wait. `None` waits forever.
pub fn timeout_ns(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
}

fn timed_out(what: &'static str, timeout: Option<Duration>) -> anyhow::Error {
    RenderError::Timeout {
        what,
        timeout: timeout.unwrap_or(Duration::MAX),
    }
    .into()
}

impl PresentBackend for VkBackend {
    fn frame_slots(&self) -> usize {
        self.frames.len()
    }

    fn extent(&self) -> RenderSize {
        RenderSize::new(self.sc.extent.width, self.sc.extent.height)
    }

    fn create_stage(&mut self, stage: SwapchainStage, size: RenderSize) -> Result<()> {
        unsafe {
            match stage {
                SwapchainStage::Swapchain => self.build_swapchain(size)?,
                SwapchainStage::ImageViews => {
                    self.sc.views =
                        create_image_views(&self.ctx.device, &self.sc.images, self.sc.format)?;
                }
                SwapchainStage::RenderPass => {
                    self.sc.render_pass = create_render_pass(&self.ctx.device, self.sc.format)?;
                }
                SwapchainStage::Pipeline => {
                    let (layout, pipeline) = create_pipeline(
                        &self.ctx.device,
                        self.sc.render_pass,
                        self.set_layout.raw(),
                        self.sc.extent,
                        &self.shaders,
                    )?;
                    self.sc.pipeline_layout = layout;
                    self.sc.pipeline = pipeline;
                }
                SwapchainStage::Framebuffers => {
                    self.sc.framebuffers = create_framebuffers(
                        &self.ctx.device,
                        self.sc.render_pass,
                        &self.sc.views,
                        self.sc.extent,
                    )?;
                }
            }
        }
        debug!("created {}", stage.name());
        Ok(())
    }

    fn destroy_stage(&mut self, stage: SwapchainStage) {
        let d = &self.ctx.device;
        unsafe {
            match stage {
                SwapchainStage::Framebuffers => {
                    for fb in self.sc.framebuffers.drain(..) {
                        d.destroy_framebuffer(fb, None);
                    }
                }
                SwapchainStage::Pipeline => {
                    d.destroy_pipeline(self.sc.pipeline, None);
                    d.destroy_pipeline_layout(self.sc.pipeline_layout, None);
                    self.sc.pipeline = vk::Pipeline::null();
                    self.sc.pipeline_layout = vk::PipelineLayout::null();
                }
                SwapchainStage::RenderPass => {
                    d.destroy_render_pass(self.sc.render_pass, None);
                    self.sc.render_pass = vk::RenderPass::null();
                }
                SwapchainStage::ImageViews => {
                    for v in self.sc.views.drain(..) {
                        d.destroy_image_view(v, None);
                    }
                }
                SwapchainStage::Swapchain => {
                    self.ctx
                        .swapchain_loader
                        .destroy_swapchain(self.sc.swapchain, None);
                    self.sc.swapchain = vk::SwapchainKHR::null();
                    self.sc.images.clear();
                }
            }
        }
        debug!("destroyed {}", stage.name());
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }.context("device_wait_idle")
    }

    fn wait_gate(&mut self, slot: usize, timeout: Option<Duration>) -> Result<()> {
        let fence = self.frames.get(slot)?.in_flight.raw();
        match unsafe {
            self.ctx
                .device
                .wait_for_fences(&[fence], true, timeout_ns(timeout))
        } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(timed_out("frame gate", timeout)),
            Err(e) => Err(e).context("wait_for_fences"),
        }
    }

    fn acquire_image(&mut self, slot: usize, timeout: Option<Duration>) -> Result<AcquireOutcome> {
        let semaphore = self.frames.get(slot)?.image_available.raw();
        let result = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.sc.swapchain,
                timeout_ns(timeout),
                semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Err(timed_out("acquire_next_image", timeout))
            }
            Err(e) => Err(RenderError::Acquire(format!("{e:?}")).into()),
        }
    }

    fn reset_gate(&mut self, slot: usize) -> Result<()> {
        let fence = self.frames.get(slot)?.in_flight.raw();
        unsafe { self.ctx.device.reset_fences(&[fence]) }.context("reset_fences")
    }

    fn update_uniforms(&mut self, slot: usize, transform: &Transform) -> Result<()> {
        let frame = self.frames.get_mut(slot)?;
        unsafe { frame.uniform.write(bytemuck::bytes_of(transform)) }
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let frame = self.frames.get(slot)?;
        let framebuffer = *self
            .sc
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| anyhow!("no framebuffer for image {image_index}"))?;
        let cmd = frame.command_buffer;
        unsafe { self.record(cmd, framebuffer, frame.descriptor_set) }
            .context("record command buffer")?;

        let wait = frame.image_available.raw();
        let signal = frame.render_finished.raw();
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        unsafe {
            self.ctx.device.queue_submit(
                self.ctx.graphics_queue,
                std::slice::from_ref(&submit),
                frame.in_flight.raw(),
            )
        }
        .map_err(|e| RenderError::Submit(format!("{e:?}")))?;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let wait = self.frames.get(slot)?.render_finished.raw();
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &self.sc.swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        match unsafe {
            self.ctx
                .swapchain_loader
                .queue_present(self.ctx.present_queue, &info)
        } {
            Ok(false) => Ok(PresentOutcome::Optimal),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(RenderError::Present(format!("{e:?}")).into()),
        }
    }
}

impl Drop for VkBackend {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        for stage in SwapchainStage::CREATION_ORDER.iter().rev() {
            self.destroy_stage(*stage);
        }
    }
}
