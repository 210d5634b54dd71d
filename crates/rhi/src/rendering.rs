//! Dynamic rendering helpers (Vulkan 1.3).
//!
//! Frames render straight into the acquired swapchain image without a
//! `VkRenderPass`. [`ColorTarget`] describes that single color attachment:
//! cleared on load, stored for presentation.

use ash::vk;

/// A single cleared color attachment covering the whole target extent.
#[derive(Clone, Copy)]
pub struct ColorTarget {
    /// View of the image being rendered to.
    pub view: vk::ImageView,
    /// Full extent of the image.
    pub extent: vk::Extent2D,
    /// RGBA clear color, each channel in `[0.0, 1.0]`.
    pub clear_color: [f32; 4],
}

impl ColorTarget {
    /// Creates a target that clears `view` to `clear_color`.
    #[inline]
    pub const fn new(view: vk::ImageView, extent: vk::Extent2D, clear_color: [f32; 4]) -> Self {
        Self {
            view,
            extent,
            clear_color,
        }
    }

    /// Attachment info: `COLOR_ATTACHMENT_OPTIMAL`, `CLEAR` then `STORE`.
    pub fn attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            })
    }

    /// Render area covering the whole target.
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        full_rect(self.extent)
    }
}

impl std::fmt::Debug for ColorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorTarget")
            .field("view", &self.view)
            .field("extent", &self.extent)
            .field("clear_color", &self.clear_color)
            .finish()
    }
}

/// Rectangle at the origin spanning `extent`.
#[inline]
pub fn full_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Viewport spanning `extent` with the standard `[0, 1]` depth range.
#[inline]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}
