// SPDX-License-Identifier: CEPL-1.0
//! winit host window driven by `pump_app_events`, so the frame loop keeps
//! control of the thread and can block on events while minimized.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use texquad_render::{RenderSize, ResizeNotifier, WindowHost};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "texquad".into(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

struct HostState {
    attributes: WindowAttributes,
    window: Option<Window>,
    window_id: Option<WindowId>,
    create_error: Option<String>,
    close_requested: bool,
    resize: Option<ResizeNotifier>,
}

impl HostState {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            window: None,
            window_id: None,
            create_error: None,
            close_requested: false,
            resize: None,
        }
    }

    /// Returns true when the event loop should exit.
    fn on_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
                true
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                if let Some(n) = &self.resize {
                    n.notify();
                }
                false
            }
            _ => false,
        }
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id != Some(window_id) {
            return;
        }
        if self.on_window_event(&event) {
            event_loop.exit();
        }
    }
}

/// The single application window plus the event loop that feeds it.
pub struct HostWindow {
    window: Window,
    state: HostState,
    event_loop: EventLoop<()>,
    exited: bool,
}

impl HostWindow {
    pub fn open(cfg: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("create event loop")?;
        let attributes = Window::default_attributes()
            .with_title(cfg.title.clone())
            .with_inner_size(PhysicalSize::new(cfg.width, cfg.height))
            .with_resizable(cfg.resizable);
        let mut state = HostState::new(attributes);

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let Some(e) = state.create_error.take() {
                return Err(anyhow!("create_window: {e}"));
            }
            if let Some(window) = state.window.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!("event loop exited ({code}) before the window was created"));
            }
        };

        let size = window.inner_size();
        info!("window open at {}x{}", size.width, size.height);

        Ok(Self {
            window,
            state,
            event_loop,
            exited: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Hands the event layer a way to request a swapchain rebuild on resize.
    pub fn register_resize_flag(&mut self, notifier: ResizeNotifier) {
        self.state.resize = Some(notifier);
    }

    /// Handles pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if self.exited {
            return;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("event loop exit ({code})");
            self.exited = true;
            self.state.close_requested = true;
        }
    }
}

impl WindowHost for HostWindow {
    fn framebuffer_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize::new(size.width, size.height)
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}
