use anyhow::{bail, Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::PathBuf;

/// Compiled by build.rs from the GLSL kept there.
pub const QUAD_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad.vert.spv"));
pub const QUAD_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad.frag.spv"));

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Debug)]
pub enum ShaderSource {
    Embedded(&'static [u8]),
    File(PathBuf),
}

impl ShaderSource {
    /// File override when configured, the built-in module otherwise.
    pub fn or_embedded(path: Option<PathBuf>, embedded: &'static [u8]) -> Self {
        match path {
            Some(p) => Self::File(p),
            None => Self::Embedded(embedded),
        }
    }

    pub fn load(&self) -> Result<Vec<u32>> {
        match self {
            Self::Embedded(bytes) => parse_spirv(bytes),
            Self::File(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("read shader {}", path.display()))?;
                parse_spirv(&bytes).with_context(|| format!("parse shader {}", path.display()))
            }
        }
    }
}

/// Vertex and fragment words, kept so the pipeline can be rebuilt with the swapchain.
pub struct ShaderCode {
    pub vert: Vec<u32>,
    pub frag: Vec<u32>,
}

pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).context("read_spv")?;
    if words.first() != Some(&SPIRV_MAGIC) {
        bail!("not a SPIR-V module (bad magic)");
    }
    Ok(words)
}

pub unsafe fn create_module(device: &ash::Device, words: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: words.len() * 4,
        p_code: words.as_ptr(),
        ..Default::default()
    };
    Ok(device.create_shader_module(&info, None)?)
}
