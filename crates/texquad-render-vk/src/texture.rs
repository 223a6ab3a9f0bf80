use anyhow::{bail, Context, Result};
use ash::vk;
use std::path::Path;
use std::rc::Rc;
use tracing::info;

use crate::context::DeviceContext;
use crate::memory::{allocate, staging_buffer};
use crate::one_shot;
use crate::swapchain::create_image_view;
use crate::transition::record_transition;

/// Tightly packed RGBA8 pixels, row-major from the top-left.
#[derive(Clone, Debug)]
pub struct TexturePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePixels {
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("load texture {}", path.display()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            bail!("texture {} is empty", path.display());
        }
        Ok(Self {
            width,
            height,
            rgba: img.into_raw(),
        })
    }

    /// Square two-tone checkerboard with `cell`-pixel squares.
    pub fn checkerboard(size: u32, cell: u32) -> Self {
        const LIGHT: [u8; 4] = [235, 235, 235, 255];
        const DARK: [u8; 4] = [45, 50, 70, 255];
        let size = size.max(1);
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                rgba.extend_from_slice(if light { &LIGHT } else { &DARK });
            }
        }
        Self {
            width: size,
            height: size,
            rgba,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Sampled 2D texture: image, memory, view and sampler.
pub struct Texture {
    ctx: Rc<DeviceContext>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

impl Texture {
    pub const FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

    /// Uploads through a staging buffer and leaves the image in
    /// SHADER_READ_ONLY_OPTIMAL.
    pub unsafe fn upload(
        ctx: &Rc<DeviceContext>,
        pool: vk::CommandPool,
        pixels: &TexturePixels,
    ) -> Result<Self> {
        if pixels.width == 0 || pixels.height == 0 {
            bail!("texture has a zero dimension");
        }
        if pixels.rgba.len() != pixels.byte_len() {
            bail!(
                "texture data is {} bytes, expected {}",
                pixels.rgba.len(),
                pixels.byte_len()
            );
        }
        let staging = staging_buffer(ctx, &pixels.rgba)?;

        let extent = vk::Extent3D {
            width: pixels.width,
            height: pixels.height,
            depth: 1,
        };
        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: Self::FORMAT,
            extent,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = ctx.device.create_image(&info, None).context("create_image")?;
        let mut tex = Self {
            ctx: Rc::clone(ctx),
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
        };

        let req = ctx.device.get_image_memory_requirements(image);
        tex.memory = allocate(ctx, req, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        ctx.device
            .bind_image_memory(image, tex.memory, 0)
            .context("bind_image_memory")?;

        transition_layout(
            ctx,
            pool,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: extent,
        };
        one_shot::submit(ctx, pool, |device, cmd| {
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.raw(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(&region),
                );
            }
            Ok(())
        })
        .context("copy texture pixels")?;

        transition_layout(
            ctx,
            pool,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        tex.view = create_image_view(&ctx.device, image, Self::FORMAT)
            .context("create texture view")?;
        tex.sampler = create_sampler(ctx)?;

        info!("texture uploaded: {}x{}", pixels.width, pixels.height);
        Ok(tex)
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            let d = &self.ctx.device;
            d.destroy_sampler(self.sampler, None);
            d.destroy_image_view(self.view, None);
            d.destroy_image(self.image, None);
            d.free_memory(self.memory, None);
        }
    }
}

/// Unsupported pairs fail before any command buffer is allocated.
pub unsafe fn transition_layout(
    ctx: &DeviceContext,
    pool: vk::CommandPool,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<()> {
    crate::transition::lookup(old, new)?;
    one_shot::submit(ctx, pool, |device, cmd| {
        unsafe { record_transition(device, cmd, image, old, new) }?;
        Ok(())
    })
    .with_context(|| format!("transition {old:?} -> {new:?}"))
}

unsafe fn create_sampler(ctx: &DeviceContext) -> Result<vk::Sampler> {
    let info = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        anisotropy_enable: if ctx.anisotropy.is_some() {
            vk::TRUE
        } else {
            vk::FALSE
        },
        max_anisotropy: ctx.anisotropy.unwrap_or(1.0),
        compare_enable: vk::FALSE,
        compare_op: vk::CompareOp::ALWAYS,
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        unnormalized_coordinates: vk::FALSE,
        ..Default::default()
    };
    ctx.device.create_sampler(&info, None).context("create_sampler")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(p: &TexturePixels, x: u32, y: u32) -> &[u8] {
        let i = ((y * p.width + x) * 4) as usize;
        &p.rgba[i..i + 4]
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let p = TexturePixels::checkerboard(64, 8);
        assert_eq!((p.width, p.height), (64, 64));
        assert_eq!(p.rgba.len(), p.byte_len());
        assert_eq!(pixel(&p, 0, 0), pixel(&p, 8, 8));
        assert_ne!(pixel(&p, 0, 0), pixel(&p, 8, 0));
        assert_ne!(pixel(&p, 0, 0), pixel(&p, 0, 8));
        assert_eq!(pixel(&p, 7, 7), pixel(&p, 0, 0));
    }

    #[test]
    fn checkerboard_is_opaque() {
        let p = TexturePixels::checkerboard(16, 4);
        assert!(p.rgba.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn loads_png_as_rgba() {
        let path = std::env::temp_dir().join(format!("texquad-tex-{}.png", std::process::id()));
        let mut img = image::RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([10, 20, 30, 40]));
        img.save(&path).unwrap();

        let p = TexturePixels::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((p.width, p.height), (3, 2));
        assert_eq!(p.rgba.len(), 3 * 2 * 4);
        assert_eq!(pixel(&p, 2, 1), &[10, 20, 30, 40]);
    }

    #[test]
    fn missing_texture_names_the_path() {
        let err = TexturePixels::load(Path::new("no/such/texture.png")).unwrap_err();
        assert!(format!("{err:#}").contains("no/such/texture.png"));
    }
}
