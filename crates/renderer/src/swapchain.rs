//! Swapchain lifetime management.
//!
//! [`SwapchainManager`] owns the presentable image chain and one view per
//! image. It rebuilds the chain from scratch, chained from the previous one,
//! whenever acquisition reports it stale or the window was resized.

use ash::vk;
use tracing::{debug, info, warn};

use vulkraft_rhi::RhiError;
use vulkraft_rhi::swapchain::{SwapchainDesc, choose_surface_format};

use crate::backend::GpuBackend;
use crate::error::{RenderError, RenderResult};

/// An image successfully acquired for rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
}

/// Outcome of an acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// An image is ready to be rendered to.
    Image(AcquiredImage),
    /// The chain must be rebuilt. When `suboptimal` is set an image was
    /// acquired anyway, so the acquire semaphore ends up signaled.
    Stale { suboptimal: bool },
}

/// Owner of the presentable image chain.
#[derive(Debug)]
pub struct SwapchainManager {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    needs_rebuild: bool,
}

impl SwapchainManager {
    /// Picks the surface format and builds the first chain.
    ///
    /// # Errors
    ///
    /// Fails if the surface reports no formats, the window has no drawable
    /// area, or creation fails.
    pub fn new<B: GpuBackend>(backend: &B) -> RenderResult<Self> {
        let formats = backend.surface_formats()?;
        let surface_format = choose_surface_format(&formats)?;

        let mut manager = Self {
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            surface_format,
            extent: vk::Extent2D::default(),
            needs_rebuild: false,
        };

        if !manager.build(backend)? {
            return Err(RenderError::Init(
                "window has no drawable area".to_string(),
            ));
        }

        Ok(manager)
    }

    /// Builds a new chain for the current drawable size, replacing the old one.
    ///
    /// Returns `false` without touching the current chain when the drawable
    /// size is zero (minimised window); the rebuild stays pending.
    pub fn build<B: GpuBackend>(&mut self, backend: &B) -> RenderResult<bool> {
        let (width, height) = backend.drawable_size();
        let capabilities = backend.surface_capabilities()?;
        let desc = SwapchainDesc::new(&capabilities, self.surface_format, width, height);

        if !desc.is_presentable() {
            debug!(
                "Drawable size is {}x{}, deferring swapchain build",
                width, height
            );
            self.needs_rebuild = true;
            return Ok(false);
        }

        let old = self.handle;
        let handle = backend.create_swapchain(&desc, old)?;

        let (images, views) = match Self::create_views(backend, handle, desc.surface_format.format)
        {
            Ok(created) => created,
            Err(e) => {
                backend.destroy_swapchain(handle);
                return Err(e);
            }
        };

        self.destroy_views(backend);
        if old != vk::SwapchainKHR::null() {
            backend.destroy_swapchain(old);
        }

        if images.len() != desc.min_image_count as usize {
            debug!(
                "Presentation engine created {} images ({} requested)",
                images.len(),
                desc.min_image_count
            );
        }

        self.handle = handle;
        self.images = images;
        self.views = views;
        self.extent = desc.extent;
        self.needs_rebuild = false;

        info!(
            "Swapchain built: {}x{}, {} images, {:?}",
            self.extent.width,
            self.extent.height,
            self.images.len(),
            self.surface_format.format
        );
        Ok(true)
    }

    /// Waits for the device to go idle, then builds a new chain.
    ///
    /// While the drawable size is zero nothing is waited on or queried and
    /// the rebuild stays pending.
    pub fn rebuild<B: GpuBackend>(&mut self, backend: &B) -> RenderResult<bool> {
        let (width, height) = backend.drawable_size();
        if width == 0 || height == 0 {
            self.needs_rebuild = true;
            return Ok(false);
        }
        backend.wait_idle()?;
        self.build(backend)
    }

    fn create_views<B: GpuBackend>(
        backend: &B,
        swapchain: vk::SwapchainKHR,
        format: vk::Format,
    ) -> RenderResult<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        let images = backend.swapchain_images(swapchain)?;
        let mut views = Vec::with_capacity(images.len());

        for &image in &images {
            match backend.create_image_view(image, format) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in views {
                        backend.destroy_image_view(view);
                    }
                    return Err(e.into());
                }
            }
        }

        Ok((images, views))
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Suboptimal and out-of-date results mark the chain for rebuild and
    /// return [`Acquire::Stale`]. Every other failure is an error.
    pub fn acquire<B: GpuBackend>(
        &mut self,
        backend: &B,
        semaphore: vk::Semaphore,
    ) -> RenderResult<Acquire> {
        match backend.acquire_next_image(self.handle, semaphore, u64::MAX) {
            Ok((index, false)) => {
                let i = index as usize;
                match (self.images.get(i), self.views.get(i)) {
                    (Some(&image), Some(&view)) => Ok(Acquire::Image(AcquiredImage {
                        index,
                        image,
                        view,
                    })),
                    _ => Err(RhiError::SwapchainError(format!(
                        "acquired image index {} out of range ({} images)",
                        index,
                        self.images.len()
                    ))
                    .into()),
                }
            }
            Ok((index, true)) => {
                debug!("Swapchain suboptimal on acquire (image {})", index);
                self.needs_rebuild = true;
                Ok(Acquire::Stale { suboptimal: true })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire");
                self.needs_rebuild = true;
                Ok(Acquire::Stale { suboptimal: false })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn destroy_views<B: GpuBackend>(&mut self, backend: &B) {
        for view in self.views.drain(..) {
            backend.destroy_image_view(view);
        }
        self.images.clear();
    }

    /// Destroys the views and the chain. Safe to call more than once.
    pub fn destroy<B: GpuBackend>(&mut self, backend: &B) {
        self.destroy_views(backend);
        if self.handle != vk::SwapchainKHR::null() {
            backend.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
            debug!("Swapchain destroyed");
        } else if self.needs_rebuild {
            warn!("Destroying swapchain manager with a rebuild still pending");
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Whether the next frame must rebuild before acquiring.
    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }
}
