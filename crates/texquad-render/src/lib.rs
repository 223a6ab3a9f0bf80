// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic frame presentation: swap-chain lifecycle, frame slots and
//! the acquire/submit/present protocol.

mod backend;
mod error;
mod frames;
mod host;
mod lifecycle;
mod presenter;
mod resize;

pub use backend::{AcquireOutcome, PresentBackend, PresentOutcome, SwapchainStage};
pub use error::RenderError;
pub use frames::FrameRing;
pub use host::WindowHost;
pub use lifecycle::SwapchainLifecycle;
pub use presenter::{FrameSettings, FrameStatus, Presenter};
pub use resize::{ResizeFlag, ResizeNotifier};

/// Framebuffer size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero dimension.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
