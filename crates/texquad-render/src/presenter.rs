// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use std::time::{Duration, Instant};
use texquad_math::{aspect_ratio, Transform};
use tracing::{debug, warn};

use crate::lifecycle::wait_for_drawable_size;
use crate::{
    AcquireOutcome, FrameRing, PresentBackend, PresentOutcome, ResizeFlag, ResizeNotifier,
    SwapchainLifecycle, WindowHost,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSettings {
    /// Bound for the gate wait and image acquisition. `None` waits forever.
    pub gate_timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, then the swapchain was rebuilt.
    PresentedThenRebuilt,
    /// Acquire reported out of date; nothing was submitted and the swapchain was rebuilt.
    Skipped,
    /// A rebuild was needed but the host is closing.
    HostClosing,
}

/// Owns a backend, its swapchain lifecycle and the frame slot ring.
pub struct Presenter<B: PresentBackend> {
    backend: B,
    lifecycle: SwapchainLifecycle,
    ring: FrameRing,
    resize: ResizeFlag,
    settings: FrameSettings,
    started: Instant,
}

impl<B: PresentBackend> Presenter<B> {
    /// Builds the first swapchain once the host reports a drawable size.
    pub fn new<H: WindowHost + ?Sized>(
        mut backend: B,
        settings: FrameSettings,
        host: &mut H,
    ) -> Result<Self> {
        let size = wait_for_drawable_size(host)
            .ok_or_else(|| anyhow!("window closed before it was ever drawable"))?;

        let mut lifecycle = SwapchainLifecycle::new();
        lifecycle
            .create(&mut backend, size)
            .context("initial swapchain")?;

        Ok(Self {
            ring: FrameRing::new(backend.frame_slots()),
            backend,
            lifecycle,
            resize: ResizeFlag::new(),
            settings,
            started: Instant::now(),
        })
    }

    /// Handle for the event layer to request a rebuild after the next present.
    pub fn resize_notifier(&self) -> ResizeNotifier {
        self.resize.notifier()
    }

    pub fn current_slot(&self) -> usize {
        self.ring.current()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.lifecycle.rebuild_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn draw_frame<H: WindowHost + ?Sized>(&mut self, host: &mut H) -> Result<FrameStatus> {
        let slot = self.ring.current();
        let timeout = self.settings.gate_timeout;

        self.backend.wait_gate(slot, timeout)?;

        let (image_index, acquire_suboptimal) = match self.backend.acquire_image(slot, timeout)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("acquire out of date on slot {slot}; frame skipped");
                return Ok(if self.rebuild(host)? {
                    FrameStatus::Skipped
                } else {
                    FrameStatus::HostClosing
                });
            }
        };

        // the gate is only reset once work is certain to be submitted
        self.backend.reset_gate(slot)?;

        let extent = self.backend.extent();
        let transform = Transform::spinning(
            self.started.elapsed(),
            aspect_ratio(extent.width, extent.height),
        );
        self.backend.update_uniforms(slot, &transform)?;
        self.backend.record_and_submit(slot, image_index)?;

        let presented = self.backend.present(slot, image_index)?;
        self.ring.advance();

        let resized = self.resize.take();
        if acquire_suboptimal || resized || presented != PresentOutcome::Optimal {
            debug!(
                "rebuild after present (acquire_suboptimal={acquire_suboptimal}, resized={resized}, present={presented:?})"
            );
            return Ok(if self.rebuild(host)? {
                FrameStatus::PresentedThenRebuilt
            } else {
                FrameStatus::HostClosing
            });
        }

        Ok(FrameStatus::Presented)
    }

    /// Waits for the device and releases the swap-chain group.
    pub fn shutdown(&mut self) -> Result<()> {
        self.backend
            .wait_idle()
            .context("device_wait_idle at shutdown")?;
        self.lifecycle.teardown(&mut self.backend);
        Ok(())
    }

    fn rebuild<H: WindowHost + ?Sized>(&mut self, host: &mut H) -> Result<bool> {
        let rebuilt = self.lifecycle.rebuild(&mut self.backend, host)?;
        if rebuilt {
            self.resize.take();
        }
        Ok(rebuilt)
    }
}

impl<B: PresentBackend> Drop for Presenter<B> {
    fn drop(&mut self) {
        if !self.lifecycle.is_live() {
            return;
        }
        if let Err(e) = self.backend.wait_idle() {
            warn!("device_wait_idle during drop: {e:#}");
        }
        self.lifecycle.teardown(&mut self.backend);
    }
}
