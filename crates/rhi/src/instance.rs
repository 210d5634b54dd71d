//! Vulkan instance management.
//!
//! This module handles VkInstance creation, the validation layer and the
//! debug messenger that forwards validation output to `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use vulkraft_rhi::instance::Instance;
//!
//! // Surface extensions normally come from the window's display handle.
//! let instance = Instance::new("Vulkraft", cfg!(debug_assertions), &[])
//!     .expect("Failed to create Vulkan instance");
//! assert!(instance.api_version() >= ash::vk::API_VERSION_1_3);
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Engine name reported to the driver.
const ENGINE_NAME: &CStr = c"Vulkraft";

/// Vulkan instance wrapper with optional validation layer support.
///
/// Owns the entry loader, the instance and, when validation is active, the
/// debug messenger. Dropping it destroys the messenger before the instance.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils loader and messenger (only present when validation is enabled)
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a Vulkan 1.3 instance.
    ///
    /// # Arguments
    ///
    /// * `application_name` - Name reported in `VkApplicationInfo`
    /// * `enable_validation` - Request the validation layer and debug messenger
    /// * `surface_extensions` - Instance extensions the window needs for surface creation
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded or instance
    /// creation fails. A missing validation layer only produces a warning.
    pub fn new(
        application_name: &str,
        enable_validation: bool,
        surface_extensions: &[*const c_char],
    ) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_name = CString::new(application_name).unwrap_or_default();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extensions = Self::collect_extensions(surface_extensions, validation_available);

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created (API 1.3, {} extension(s))",
            extensions.len()
        );

        let debug = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => {
                    info!("Validation layer enabled with debug messenger");
                    Some((debug_utils, messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether the debug messenger is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }

    /// Highest instance-level API version the loader supports.
    pub fn api_version(&self) -> u32 {
        unsafe { self.entry.try_enumerate_instance_version() }
            .ok()
            .flatten()
            .unwrap_or(vk::API_VERSION_1_0)
    }

    /// Window surface extensions plus debug utils when validation is on.
    fn collect_extensions(
        surface_extensions: &[*const c_char],
        with_debug_utils: bool,
    ) -> Vec<*const c_char> {
        let mut extensions = surface_extensions.to_vec();
        let surface = ash::khr::surface::NAME.as_ptr();
        if !extensions
            .iter()
            .any(|&ext| unsafe { CStr::from_ptr(ext) } == ash::khr::surface::NAME)
        {
            extensions.push(surface);
        }
        if with_debug_utils {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        extensions
    }

    /// Checks if the Khronos validation layer is available.
    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        Ok(available_layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        }))
    }

    /// Sets up the debug messenger for validation layer callbacks.
    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
                debug!("Debug messenger destroyed");
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Routes validation layer messages into `tracing`.
///
/// # Safety
///
/// Called by the Vulkan loader with a callback data pointer that is either
/// null or valid for the duration of the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[Vulkan {}] {}", kind, message),
        _ => debug!("[Vulkan {}] {}", kind, message),
    }

    vk::FALSE
}
