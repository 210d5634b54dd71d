//! Window service using winit.
//!
//! Creates the application window, reports its live drawable size, tracks
//! close requests and creates the Vulkan surface bound to it.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vulkraft_core::{AppConfig, Error, Result};

/// RAII wrapper for a Vulkan surface.
///
/// The surface is destroyed when this struct is dropped; the instance it was
/// created from must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle, valid for the lifetime of this `Surface`.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader, for capability / format queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface from
        // the same instance as the loader and is destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// The application window.
pub struct Window {
    window: Arc<WinitWindow>,
    close_requested: bool,
}

impl Window {
    /// Creates a window with the configured title, size and resizability.
    pub fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!(
            "Window created: \"{}\" {}x{}",
            config.title,
            config.width,
            config.height
        );

        Ok(Self {
            window: Arc::new(window),
            close_requested: false,
        })
    }

    /// Get a reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Get an Arc reference to the underlying winit window.
    pub fn inner_arc(&self) -> Arc<WinitWindow> {
        self.window.clone()
    }

    /// Current drawable size in physical pixels. Zero while minimised on
    /// some platforms.
    pub fn drawable_size(&self) -> (u32, u32) {
        drawable_size(&self.window)
    }

    /// Marks the window as wanting to close.
    pub fn request_close(&mut self) {
        if !self.close_requested {
            tracing::debug!("Window close requested");
        }
        self.close_requested = true;
    }

    /// Whether the user asked to close the window.
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to create a surface for this window.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        get_required_extensions(display_handle.as_raw())
    }

    /// Create a Vulkan surface for this window.
    ///
    /// # Errors
    /// Returns an error if the window handles are unavailable or surface
    /// creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid; the handles come from a live
        // winit window. The surface is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Surface(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

/// Drawable size of a winit window in physical pixels.
pub fn drawable_size(window: &WinitWindow) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}

/// Get the required Vulkan extensions for surface creation on the current platform.
///
/// The returned pointers reference static strings owned by `ash-window`.
pub fn get_required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Surface(format!("Failed to enumerate required extensions: {}", e)))?;

    tracing::debug!(
        "Required Vulkan extensions for surface: {:?}",
        extensions
            .iter()
            // SAFETY: ash_window returns valid, nul-terminated static strings.
            .map(|&ext| unsafe { CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
