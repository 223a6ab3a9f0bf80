//! Swapchain parameter policy. Pure functions over surface queries.
use ash::vk;
use texquad_render::RenderSize;

pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
pub const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Preferred sRGB BGRA pair if offered, else the first entry. `None` only for an empty list.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT && f.color_space == PREFERRED_COLOR_SPACE)
        .or_else(|| formats.first().copied())
}

/// MAILBOX when available, otherwise FIFO (always supported).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    if modes.is_empty() {
        return None;
    }
    Some(if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    })
}

/// Surface extent, or the framebuffer size clamped into the surface bounds when
/// the surface leaves sizing to the swapchain (`u32::MAX` sentinel).
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by `configured_max` (0 = no cap) and by the
/// surface maximum (0 = unbounded), never below the surface minimum.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, configured_max: u32) -> u32 {
    let mut count = caps.min_image_count + 1;
    if configured_max > 0 {
        count = count.min(configured_max);
    }
    count = count.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn wh(e: vk::Extent2D) -> (u32, u32) {
        (e.width, e.height)
    }

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        }
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        use vk::PresentModeKHR as M;
        assert_eq!(choose_present_mode(&[M::FIFO]), Some(M::FIFO));
        assert_eq!(choose_present_mode(&[M::FIFO, M::MAILBOX]), Some(M::MAILBOX));
        assert_eq!(choose_present_mode(&[M::MAILBOX]), Some(M::MAILBOX));
        assert_eq!(choose_present_mode(&[M::IMMEDIATE, M::FIFO]), Some(M::FIFO));
        assert_eq!(choose_present_mode(&[]), None);
    }

    fn chosen(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
        choose_surface_format(formats).map(|f| (f.format, f.color_space))
    }

    #[test]
    fn format_prefers_srgb_bgra_nonlinear() {
        let srgb = fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let other = fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let want_srgb = Some((vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR));
        assert_eq!(chosen(&[srgb, other]), want_srgb);
        assert_eq!(chosen(&[other, srgb]), want_srgb);
        assert_eq!(
            chosen(&[other]),
            Some((vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert_eq!(chosen(&[]), None);
    }

    #[test]
    fn format_needs_matching_color_space() {
        let wrong_cs = fmt(
            vk::Format::B8G8R8A8_SRGB,
            vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        );
        let other = fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        assert_eq!(
            chosen(&[wrong_cs, other]),
            Some((
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT
            ))
        );
    }

    #[test]
    fn sentinel_extent_clamps_framebuffer() {
        let c = caps((u32::MAX, u32::MAX), (1, 200), (4096, 4096));
        assert_eq!(wh(choose_extent(&c, RenderSize::new(5000, 100))), (4096, 200));
        assert_eq!(wh(choose_extent(&c, RenderSize::new(1024, 768))), (1024, 768));
    }

    #[test]
    fn concrete_extent_is_returned_unchanged() {
        let c = caps((800, 600), (1, 1), (4096, 4096));
        assert_eq!(wh(choose_extent(&c, RenderSize::new(1920, 1080))), (800, 600));
    }

    #[test]
    fn image_count_is_clamped() {
        let mut c = caps((800, 600), (1, 1), (4096, 4096));
        assert_eq!(choose_image_count(&c, 0), 3);
        assert_eq!(choose_image_count(&c, 3), 3);
        assert_eq!(choose_image_count(&c, 1), 2);

        c.max_image_count = 2;
        assert_eq!(choose_image_count(&c, 0), 2);

        c.max_image_count = 0;
        c.min_image_count = 5;
        assert_eq!(choose_image_count(&c, 3), 5);
        assert_eq!(choose_image_count(&c, 0), 6);
    }
}
