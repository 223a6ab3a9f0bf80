use anyhow::{Context, Result};
use ash::khr::surface;
use ash::vk;
use texquad_render::RenderSize;
use tracing::info;

use crate::context::DeviceContext;
use crate::selection::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
use crate::SurfaceError;

/// Snapshot of what the surface currently supports.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        Ok(Self {
            caps: loader
                .get_physical_device_surface_capabilities(phys, surface)
                .context("get_physical_device_surface_capabilities")?,
            formats: loader
                .get_physical_device_surface_formats(phys, surface)
                .context("get_physical_device_surface_formats")?,
            present_modes: loader
                .get_physical_device_surface_present_modes(phys, surface)
                .context("get_physical_device_surface_present_modes")?,
        })
    }
}

/// Parameters for one swapchain build.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainPlan {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    pub fn new(
        support: &SurfaceSupport,
        framebuffer: RenderSize,
        max_image_count: u32,
    ) -> Result<Self, SurfaceError> {
        let format = choose_surface_format(&support.formats).ok_or(SurfaceError::NoFormats)?;
        let present_mode =
            choose_present_mode(&support.present_modes).ok_or(SurfaceError::NoPresentModes)?;
        Ok(Self {
            format,
            present_mode,
            extent: choose_extent(&support.caps, framebuffer),
            image_count: choose_image_count(&support.caps, max_image_count),
            pre_transform: support.caps.current_transform,
        })
    }
}

pub unsafe fn create_swapchain(
    ctx: &DeviceContext,
    plan: &SwapchainPlan,
) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
    let families = [ctx.families.graphics, ctx.families.present];
    let (sharing_mode, family_count, family_ptr) = if ctx.families.graphics != ctx.families.present
    {
        (vk::SharingMode::CONCURRENT, 2, families.as_ptr())
    } else {
        (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
    };

    let info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface: ctx.instance.surface,
        min_image_count: plan.image_count,
        image_format: plan.format.format,
        image_color_space: plan.format.color_space,
        image_extent: plan.extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: sharing_mode,
        queue_family_index_count: family_count,
        p_queue_family_indices: family_ptr,
        pre_transform: plan.pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode: plan.present_mode,
        clipped: vk::TRUE,
        // the previous swapchain is always destroyed before a rebuild
        old_swapchain: vk::SwapchainKHR::null(),
        ..Default::default()
    };

    let swapchain = ctx
        .swapchain_loader
        .create_swapchain(&info, None)
        .context("create_swapchain")?;
    let images = match ctx.swapchain_loader.get_swapchain_images(swapchain) {
        Ok(images) => images,
        Err(e) => {
            ctx.swapchain_loader.destroy_swapchain(swapchain, None);
            return Err(e).context("get_swapchain_images");
        }
    };

    info!(
        "swapchain: format {:?} / {:?}, present mode {:?}, extent {}x{}, images {} (requested {})",
        plan.format.format,
        plan.format.color_space,
        plan.present_mode,
        plan.extent.width,
        plan.extent.height,
        images.len(),
        plan.image_count
    );
    Ok((swapchain, images))
}

pub unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    Ok(device.create_image_view(&info, None)?)
}

/// One view per image. Views already made are destroyed if a later one fails.
pub unsafe fn create_image_views(
    device: &ash::Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        match create_image_view(device, image, format) {
            Ok(v) => views.push(v),
            Err(e) => {
                for v in views {
                    device.destroy_image_view(v, None);
                }
                return Err(e.context("create_image_view"));
            }
        }
    }
    Ok(views)
}
