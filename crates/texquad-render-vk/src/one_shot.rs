//! Synchronous setup-time command submission. Each call stalls the graphics
//! queue, so nothing on the per-frame path goes through here.
use anyhow::{Context, Result};
use ash::vk;

use crate::context::DeviceContext;

/// Allocates a transient command buffer, lets `record` fill it, submits it
/// without semaphores and waits for the queue to go idle. The buffer is freed
/// on every path.
pub unsafe fn submit<F>(ctx: &DeviceContext, pool: vk::CommandPool, record: F) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
{
    let alloc = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    let cmd = ctx
        .device
        .allocate_command_buffers(&alloc)
        .context("allocate_command_buffers(one-shot)")?[0];

    let result = record_and_wait(ctx, cmd, record);
    ctx.device
        .free_command_buffers(pool, std::slice::from_ref(&cmd));
    result
}

unsafe fn record_and_wait<F>(ctx: &DeviceContext, cmd: vk::CommandBuffer, record: F) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
{
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        ..Default::default()
    };
    ctx.device
        .begin_command_buffer(cmd, &begin)
        .context("begin_command_buffer(one-shot)")?;
    record(&ctx.device, cmd)?;
    ctx.device
        .end_command_buffer(cmd)
        .context("end_command_buffer(one-shot)")?;

    let submit = vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        command_buffer_count: 1,
        p_command_buffers: &cmd,
        ..Default::default()
    };
    ctx.device
        .queue_submit(
            ctx.graphics_queue,
            std::slice::from_ref(&submit),
            vk::Fence::null(),
        )
        .context("queue_submit(one-shot)")?;
    ctx.device
        .queue_wait_idle(ctx.graphics_queue)
        .context("queue_wait_idle(one-shot)")?;
    Ok(())
}
