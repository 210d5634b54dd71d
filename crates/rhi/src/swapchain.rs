//! Swapchain creation policy.
//!
//! Pure functions deciding how a presentable-image chain is built from the
//! surface's reported capabilities: pixel format, extent, image count and the
//! fixed FIFO / opaque / identity settings. The chain's lifetime itself is
//! managed by the renderer.

use ash::vk;
use tracing::{debug, warn};

use crate::error::{RhiError, RhiResult};

/// Present mode used for every chain. FIFO is the only mode guaranteed to exist.
pub const PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Swapchain images are only ever rendered to as color attachments.
pub const IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::COLOR_ATTACHMENT;

/// Subresource range of a single-mip, single-layer color image.
pub const COLOR_SUBRESOURCE_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Everything needed to create one presentable-image chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Pixel format and color space of the images.
    pub surface_format: vk::SurfaceFormatKHR,
    /// Image extent in pixels.
    pub extent: vk::Extent2D,
    /// Requested image count: the surface's minimum.
    pub min_image_count: u32,
}

impl SwapchainDesc {
    /// Describes a chain for the current capabilities and drawable size.
    pub fn new(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        drawable_width: u32,
        drawable_height: u32,
    ) -> Self {
        Self {
            surface_format,
            extent: choose_extent(capabilities, drawable_width, drawable_height),
            min_image_count: capabilities.min_image_count,
        }
    }

    /// A zero-area extent cannot back a swapchain (minimised window).
    #[inline]
    pub fn is_presentable(&self) -> bool {
        self.extent.width > 0 && self.extent.height > 0
    }

    /// Fills a `VkSwapchainCreateInfoKHR`, chaining from `old_swapchain`
    /// (null for the first chain).
    pub fn create_info(
        &self,
        surface: vk::SurfaceKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> vk::SwapchainCreateInfoKHR<'static> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.min_image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(IMAGE_USAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(PRESENT_MODE)
            .clipped(true)
            .old_swapchain(old_swapchain)
    }
}

/// Picks the surface format: B8G8R8A8_SRGB, then B8G8R8A8_UNORM (both with
/// SRGB_NONLINEAR), then whatever the surface lists first.
///
/// # Errors
///
/// Returns an error if the surface reports no formats at all.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let find = |format: vk::Format| {
        formats
            .iter()
            .find(|f| f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .copied()
    };

    if let Some(format) = find(vk::Format::B8G8R8A8_SRGB) {
        debug!("Selected surface format B8G8R8A8_SRGB / SRGB_NONLINEAR");
        return Ok(format);
    }

    if let Some(format) = find(vk::Format::B8G8R8A8_UNORM) {
        warn!("Using fallback surface format B8G8R8A8_UNORM / SRGB_NONLINEAR");
        return Ok(format);
    }

    let first = formats
        .first()
        .copied()
        .ok_or_else(|| RhiError::SurfaceError("surface reports no formats".to_string()))?;
    warn!("Using first available surface format: {:?}", first.format);
    Ok(first)
}

/// Chooses the image extent.
///
/// When the surface dictates its size (`current_extent` is not the
/// `0xFFFFFFFF` sentinel) that size is used; otherwise the drawable size is
/// clamped to the surface limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// 2D color view of a swapchain image with identity swizzle.
pub fn color_view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::R,
            g: vk::ComponentSwizzle::G,
            b: vk::ComponentSwizzle::B,
            a: vk::ComponentSwizzle::A,
        })
        .subresource_range(COLOR_SUBRESOURCE_RANGE)
}
