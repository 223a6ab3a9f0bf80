// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

/// What the frame loop needs from the windowing layer.
pub trait WindowHost {
    /// Current drawable size in pixels; zero while minimized.
    fn framebuffer_size(&self) -> RenderSize;

    /// Blocks until at least one host event has been handled.
    fn wait_events(&mut self);

    fn should_close(&self) -> bool;
}
