//! Renderer facade.
//!
//! [`Renderer`] composes the frame slot pool, the swapchain manager and the
//! GPU backend into the two calls an application loop needs:
//! [`try_get_frame`](Renderer::try_get_frame) and
//! [`deinit`](Renderer::deinit).
//!
//! # Example
//!
//! ```no_run
//! use vulkraft_platform::Window;
//! use vulkraft_renderer::{Renderer, RendererConfig};
//!
//! # fn example(window: &Window) -> Result<(), vulkraft_renderer::RenderError> {
//! let mut renderer = Renderer::new(window, &RendererConfig::default())?;
//!
//! let mut frame = renderer.try_get_frame()?;
//! if frame.is_valid() {
//!     frame.begin([0.1, 0.2, 0.3, 1.0])?;
//!     frame.end()?;
//!     frame.submit_and_present()?;
//! }
//! drop(frame);
//!
//! renderer.deinit();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use vulkraft_core::AppConfig;
use vulkraft_platform::Window;
use vulkraft_rhi::device::Device;

use crate::backend::GpuBackend;
use crate::context::VulkanContext;
use crate::error::{RenderError, RenderResult};
use crate::frame_slots::FrameSlotPool;
use crate::session::FrameSession;
use crate::swapchain::{Acquire, SwapchainManager};

/// Renderer settings.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Name reported to the Vulkan driver.
    pub application_name: String,
    /// Enable the validation layer and debug messenger.
    pub enable_validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkraft".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl From<&AppConfig> for RendererConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            application_name: config.title.clone(),
            enable_validation: config.enable_validation,
        }
    }
}

/// Frame loop front end.
///
/// Holds `slot_count` frame slots, where `slot_count` is the surface's
/// minimum image count, so at most that many frames are in flight.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Destroy frame slots (fences, semaphores, command pools)
/// 3. Destroy image views and the swapchain
/// 4. Drop the backend (device, surface, instance)
pub struct Renderer<B: GpuBackend = VulkanContext> {
    slots: FrameSlotPool,
    swapchain: SwapchainManager,
    /// `None` once torn down.
    backend: Option<B>,
}

impl Renderer<VulkanContext> {
    /// Boots Vulkan for `window` and builds the frame machinery.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Init`] if any part of device or surface setup
    /// fails.
    pub fn new(window: &Window, config: &RendererConfig) -> RenderResult<Self> {
        let (width, height) = window.drawable_size();
        info!("Initializing renderer ({}x{})", width, height);

        let backend = VulkanContext::new(window, config)?;
        Self::with_backend(backend)
    }

    /// Shared handle to the logical device, for creating pipelines and
    /// shaders. `None` after [`deinit`](Self::deinit).
    ///
    /// A clone may outlive the renderer: the device keeps its instance alive
    /// and is destroyed with the last clone.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.backend.as_ref().map(|b| b.device().clone())
    }
}

impl<B: GpuBackend> Renderer<B> {
    /// Builds the swapchain and frame slots on top of an existing backend.
    pub fn with_backend(backend: B) -> RenderResult<Self> {
        let capabilities = backend.surface_capabilities()?;
        let slot_count = capabilities.min_image_count.max(1) as usize;

        let mut swapchain = SwapchainManager::new(&backend)?;

        let slots =
            match FrameSlotPool::new(&backend, backend.graphics_queue_family(), slot_count) {
                Ok(slots) => slots,
                Err(e) => {
                    swapchain.destroy(&backend);
                    return Err(e);
                }
            };

        info!(
            "Renderer ready: {} frame slots, {} swapchain images",
            slots.slot_count(),
            swapchain.image_count()
        );

        Ok(Self {
            slots,
            swapchain,
            backend: Some(backend),
        })
    }

    /// Prepares the next frame.
    ///
    /// Blocks until the next slot's previous submission has finished, then
    /// acquires an image. Returns an empty session when the swapchain had to
    /// be rebuilt (or cannot be, while the window is minimised); the caller
    /// should skip this tick.
    ///
    /// # Errors
    ///
    /// Any unexpected Vulkan failure is returned and should be treated as
    /// fatal. [`RenderError::ShutDown`] after [`deinit`](Self::deinit).
    pub fn try_get_frame(&mut self) -> RenderResult<FrameSession<'_, B>> {
        let Some(backend) = self.backend.as_ref() else {
            return Err(RenderError::ShutDown);
        };

        let slot = self.slots.next_slot();
        backend.wait_for_fence(slot.fence, u64::MAX)?;

        if self.swapchain.needs_rebuild() && !self.swapchain.rebuild(backend)? {
            return Ok(FrameSession::empty());
        }

        match self.swapchain.acquire(backend, slot.image_acquired)? {
            Acquire::Image(image) => {
                // The fence is reset by `begin`, or by the session's drop.
                Ok(FrameSession::new(
                    backend,
                    slot,
                    self.swapchain.handle(),
                    self.swapchain.extent(),
                    image,
                ))
            }
            Acquire::Stale { suboptimal } => {
                debug!("Skipping frame, rebuilding swapchain");
                let rebuilt = self.swapchain.rebuild(backend)?;
                if suboptimal {
                    // The acquisition's signal must retire before the semaphore goes.
                    if !rebuilt {
                        backend.wait_idle()?;
                    }
                    self.slots.replace_acquire_semaphore(backend, slot.index)?;
                }
                Ok(FrameSession::empty())
            }
        }
    }

    /// Tears everything down after the device goes idle.
    ///
    /// Calling it again is a no-op. Also runs on drop.
    pub fn deinit(&mut self) {
        let Some(backend) = self.backend.take() else {
            return;
        };

        info!("Shutting down renderer");

        if let Err(e) = backend.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {}", e);
        }

        self.slots.destroy(&backend);
        self.swapchain.destroy(&backend);
        drop(backend);

        info!("Renderer destroyed");
    }

    /// Whether [`deinit`](Self::deinit) has run.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.backend.is_none()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Number of frame slots, the bound on frames in flight.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.slot_count()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }
}

impl<B: GpuBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.deinit();
    }
}
