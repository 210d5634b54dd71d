//! Physical device (GPU) selection.
//!
//! A device qualifies when it:
//! 1. Supports Vulkan 1.3 with `dynamicRendering` and `synchronization2`
//! 2. Exposes the swapchain extension
//! 3. Has one queue family that can both render and present to the surface
//!
//! Among qualifying devices discrete GPUs are preferred.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Device extensions the renderer cannot run without.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices discovered on a physical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// First family that can present to the surface.
    pub present_family: Option<u32>,
    /// First family that supports both, used for the single frame queue.
    pub unified_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Classifies queue families from `(queue_flags, queue_count, can_present)`
    /// triples, in family index order.
    pub fn from_families<I>(families: I) -> Self
    where
        I: IntoIterator<Item = (vk::QueueFlags, u32, bool)>,
    {
        let mut indices = Self::default();

        for (i, (flags, queue_count, can_present)) in families.into_iter().enumerate() {
            let i = i as u32;
            if queue_count == 0 {
                continue;
            }

            let has_graphics = flags.contains(vk::QueueFlags::GRAPHICS);
            if has_graphics && indices.graphics_family.is_none() {
                indices.graphics_family = Some(i);
            }
            if can_present && indices.present_family.is_none() {
                indices.present_family = Some(i);
            }
            if has_graphics && can_present && indices.unified_family.is_none() {
                indices.unified_family = Some(i);
            }
        }

        indices
    }

    /// A single family can both render and present.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.unified_family.is_some()
    }
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue family indices.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// The family used for both rendering and presentation.
    ///
    /// Only devices with a complete [`QueueFamilyIndices`] are ever selected,
    /// so this is always `Some` on a selected device.
    #[inline]
    pub fn queue_family(&self) -> Option<u32> {
        self.queue_families.unified_family
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version),
                    vk::api_version_patch(version)
                ),
            )
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] describing why every candidate was
/// rejected when no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu(
            "no Vulkan-capable GPU present".to_string(),
        ));
    }

    info!("Found {} GPU(s)", devices.len());

    let mut rejections = Vec::new();
    let mut candidates = Vec::new();

    for device in devices {
        match check_device_suitability(instance, device, surface, surface_loader) {
            Ok(info) => {
                let score = rate_device(&info);
                debug!(
                    "GPU '{}' ({}) - Score: {}",
                    info.device_name(),
                    info.device_type_name(),
                    score
                );
                candidates.push((info, score));
            }
            Err(reason) => {
                debug!("GPU skipped: {}", reason);
                rejections.push(reason);
            }
        }
    }

    let Some((selected, score)) = candidates.into_iter().max_by_key(|(_, score)| *score) else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu(rejections.join("\n")));
    };

    info!(
        "Selected GPU: '{}' ({}), score {}",
        selected.device_name(),
        selected.device_type_name(),
        score
    );

    Ok(selected)
}

/// Returns the device info when `device` meets every requirement, otherwise
/// the reason it was rejected.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, String> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_string());

    if !supports_api_1_3(properties.api_version) {
        return Err(format!(
            "'{}': Vulkan 1.3 not supported (version {}.{})",
            name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        ));
    }

    let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default().push_next(&mut features_1_3);
    unsafe { instance.get_physical_device_features2(device, &mut features) };
    if features_1_3.dynamic_rendering == vk::FALSE || features_1_3.synchronization2 == vk::FALSE {
        return Err(format!(
            "'{}': dynamicRendering and synchronization2 are required",
            name
        ));
    }

    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .map_err(|e| format!("'{}': cannot enumerate extensions ({})", name, e))?
    };
    for required in REQUIRED_DEVICE_EXTENSIONS {
        let found = extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == *required));
        if !found {
            return Err(format!("'{}': missing extension {:?}", name, required));
        }
    }

    let family_properties =
        unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_families =
        QueueFamilyIndices::from_families(family_properties.iter().enumerate().map(|(i, f)| {
            let can_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i as u32, surface)
                    .unwrap_or(false)
            };
            (f.queue_flags, f.queue_count, can_present)
        }));

    if !queue_families.is_complete() {
        return Err(format!(
            "'{}': no queue family supports both graphics and present (graphics={:?}, present={:?})",
            name, queue_families.graphics_family, queue_families.present_family
        ));
    }

    Ok(PhysicalDeviceInfo {
        device,
        properties,
        queue_families,
    })
}

fn supports_api_1_3(version: u32) -> bool {
    let major = vk::api_version_major(version);
    let minor = vk::api_version_minor(version);
    major > 1 || (major == 1 && minor >= 3)
}

/// Rates a physical device; higher is better.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let type_score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    type_score + info.properties.limits.max_image_dimension2_d
}
