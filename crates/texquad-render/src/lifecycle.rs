// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{PresentBackend, RenderSize, SwapchainStage, WindowHost};

/// Tracks which swap-chain stages are alive and drives create/teardown/rebuild.
///
/// Stages are destroyed strictly in reverse of the order they were built,
/// including when `create` fails half way.
#[derive(Debug, Default)]
pub struct SwapchainLifecycle {
    live: Vec<SwapchainStage>,
    rebuilds: u64,
}

impl SwapchainLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn live_stages(&self) -> &[SwapchainStage] {
        &self.live
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn create<B: PresentBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        size: RenderSize,
    ) -> Result<()> {
        debug_assert!(self.live.is_empty(), "create over live swapchain");
        for stage in SwapchainStage::CREATION_ORDER {
            if let Err(e) = backend.create_stage(stage, size) {
                self.teardown(backend);
                return Err(e.context(format!("create {}", stage.name())));
            }
            self.live.push(stage);
        }
        info!("swapchain ready at {size}");
        Ok(())
    }

    pub fn teardown<B: PresentBackend + ?Sized>(&mut self, backend: &mut B) {
        while let Some(stage) = self.live.pop() {
            debug!("destroy {}", stage.name());
            backend.destroy_stage(stage);
        }
    }

    /// Waits for a drawable size, idles the device, then tears down and recreates.
    ///
    /// Returns `Ok(false)` without touching anything if the host starts closing
    /// while the window is still minimized.
    pub fn rebuild<B, H>(&mut self, backend: &mut B, host: &mut H) -> Result<bool>
    where
        B: PresentBackend + ?Sized,
        H: WindowHost + ?Sized,
    {
        let Some(size) = wait_for_drawable_size(host) else {
            info!("host closing while minimized; rebuild abandoned");
            return Ok(false);
        };

        backend.wait_idle().context("device_wait_idle before rebuild")?;
        self.teardown(backend);
        self.create(backend, size)?;
        self.rebuilds += 1;
        Ok(true)
    }
}

/// Blocks on host events while the framebuffer is zero-sized.
pub(crate) fn wait_for_drawable_size<H: WindowHost + ?Sized>(host: &mut H) -> Option<RenderSize> {
    let mut logged = false;
    loop {
        let size = host.framebuffer_size();
        if !size.is_empty() {
            return Some(size);
        }
        if host.should_close() {
            return None;
        }
        if !logged {
            debug!("framebuffer is {size}; waiting for events");
            logged = true;
        }
        host.wait_events();
    }
}
