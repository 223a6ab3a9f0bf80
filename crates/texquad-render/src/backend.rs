// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use std::time::Duration;
use texquad_math::Transform;

use crate::RenderSize;

/// Swap-chain-level objects, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapchainStage {
    Swapchain,
    ImageViews,
    RenderPass,
    Pipeline,
    Framebuffers,
}

impl SwapchainStage {
    pub const CREATION_ORDER: [SwapchainStage; 5] = [
        SwapchainStage::Swapchain,
        SwapchainStage::ImageViews,
        SwapchainStage::RenderPass,
        SwapchainStage::Pipeline,
        SwapchainStage::Framebuffers,
    ];

    /// Stages that must be alive while this one is.
    pub const fn depends_on(self) -> &'static [SwapchainStage] {
        match self {
            SwapchainStage::Swapchain => &[],
            SwapchainStage::ImageViews => &[SwapchainStage::Swapchain],
            // render pass attachment format comes from the swapchain
            SwapchainStage::RenderPass => &[SwapchainStage::Swapchain],
            SwapchainStage::Pipeline => &[SwapchainStage::RenderPass],
            SwapchainStage::Framebuffers => {
                &[SwapchainStage::ImageViews, SwapchainStage::RenderPass]
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SwapchainStage::Swapchain => "swapchain",
            SwapchainStage::ImageViews => "image views",
            SwapchainStage::RenderPass => "render pass",
            SwapchainStage::Pipeline => "graphics pipeline",
            SwapchainStage::Framebuffers => "framebuffers",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// GPU side of the frame loop.
///
/// Slots index the backend's in-flight frame resources and are always
/// `< frame_slots()`. A `None` timeout waits without bound. Unrecoverable
/// driver results come back as `Err`, usually wrapping a
/// [`RenderError`](crate::RenderError).
pub trait PresentBackend {
    fn frame_slots(&self) -> usize;

    /// Current swap-chain extent, used for the projection aspect.
    fn extent(&self) -> RenderSize;

    fn create_stage(&mut self, stage: SwapchainStage, size: RenderSize) -> Result<()>;
    fn destroy_stage(&mut self, stage: SwapchainStage);

    fn wait_idle(&mut self) -> Result<()>;

    /// Blocks until the slot's previous submission has completed.
    fn wait_gate(&mut self, slot: usize, timeout: Option<Duration>) -> Result<()>;
    fn acquire_image(&mut self, slot: usize, timeout: Option<Duration>) -> Result<AcquireOutcome>;
    fn reset_gate(&mut self, slot: usize) -> Result<()>;

    fn update_uniforms(&mut self, slot: usize, transform: &Transform) -> Result<()>;

    /// Records the slot's command buffer for `image_index` and submits it,
    /// waiting on image-available and signalling render-complete and the gate.
    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_order_satisfies_dependencies() {
        for (i, stage) in SwapchainStage::CREATION_ORDER.iter().enumerate() {
            for dep in stage.depends_on() {
                let at = SwapchainStage::CREATION_ORDER
                    .iter()
                    .position(|s| s == dep)
                    .unwrap();
                assert!(at < i, "{} built before {}", stage.name(), dep.name());
            }
        }
    }
}
