// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use texquad_platform::WindowConfig;
use texquad_render::FrameSettings;
use texquad_render_vk::VkOptions;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub assets: AssetsCfg,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let w = WindowConfig::default();
        Self {
            title: w.title,
            width: w.width,
            height: w.height,
            resizable: w.resizable,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderCfg {
    pub frames_in_flight: usize,
    /// 0 leaves only the surface limits.
    pub max_image_count: u32,
    /// Unset waits forever on the frame gate and on acquire.
    pub frame_timeout_ms: Option<u64>,
    pub clear_color: [f32; 4],
    /// Defaults to on in debug builds.
    pub validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkOptions::default();
        Self {
            frames_in_flight: vk.frames_in_flight,
            max_image_count: vk.max_image_count,
            frame_timeout_ms: None,
            clear_color: vk.clear_color,
            validation: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssetsCfg {
    pub texture: Option<PathBuf>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

impl AppConfig {
    /// Missing file means defaults. Anything unreadable or malformed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        let cfg = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        info!("config loaded from {}", path.display());
        Ok(cfg)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn window(&self) -> WindowConfig {
        WindowConfig {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
            resizable: self.window.resizable,
        }
    }

    pub fn vk_options(&self) -> VkOptions {
        VkOptions {
            frames_in_flight: self.render.frames_in_flight.max(1),
            max_image_count: self.render.max_image_count,
            clear_color: self.render.clear_color,
            validation: self.render.validation.unwrap_or(cfg!(debug_assertions)),
            texture: self.assets.texture.clone(),
            vertex_shader: self.assets.vertex_shader.clone(),
            fragment_shader: self.assets.fragment_shader.clone(),
        }
    }

    pub fn frame_settings(&self) -> FrameSettings {
        FrameSettings {
            gate_timeout: self.render.frame_timeout_ms.map(Duration::from_millis),
        }
    }
}
