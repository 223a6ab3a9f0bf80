// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use texquad_core::init_tracing;
use texquad_platform::HostWindow;
use texquad_render::{FrameStatus, Presenter, WindowHost};
use texquad_render_vk::VkBackend;
use tracing::info;

mod config;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; defaults apply when it does not exist
    #[arg(long, default_value = "texquad.toml")]
    config: PathBuf,
}

fn run(cfg: &AppConfig) -> Result<()> {
    // declared before the presenter so the window outlives the swapchain
    let mut host = HostWindow::open(&cfg.window())?;
    let backend = VkBackend::new(host.window(), host.window(), &cfg.vk_options())
        .context("vulkan init")?;
    let mut presenter = Presenter::new(backend, cfg.frame_settings(), &mut host)?;
    host.register_resize_flag(presenter.resize_notifier());

    let mut frames = 0u32;
    let mut last_fps = Instant::now();
    loop {
        host.poll_events();
        if host.should_close() {
            break;
        }
        match presenter.draw_frame(&mut host)? {
            FrameStatus::HostClosing => break,
            FrameStatus::Skipped => {}
            FrameStatus::Presented | FrameStatus::PresentedThenRebuilt => {
                frames = frames.saturating_add(1);
            }
        }

        let now = Instant::now();
        if now.duration_since(last_fps).as_secs_f32() >= 1.0 {
            info!("fps ~ {frames}");
            frames = 0;
            last_fps = now;
        }
    }

    info!(
        "shutting down after {} swapchain rebuilds",
        presenter.rebuild_count()
    );
    presenter.shutdown()
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;
    run(&cfg)
}
