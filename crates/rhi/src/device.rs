//! Vulkan logical device and queue management.
//!
//! The renderer drives a single queue that is used for both submission and
//! presentation, taken from the unified family found during physical device
//! selection.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
///
/// Shared through `Arc` by everything that creates device-level objects
/// (shaders, pipelines). Dropping the last reference waits for the device to
/// go idle and destroys it. The device holds a reference to its [`Instance`],
/// so the instance is only destroyed after every device clone is gone.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// Graphics + present queue.
    queue: vk::Queue,
    /// Family index of `queue`.
    queue_family: u32,
    /// Parent instance. Released after the device is destroyed.
    instance: Arc<Instance>,
}

impl Device {
    /// Creates the logical device with the Vulkan 1.3 `dynamicRendering` and
    /// `synchronization2` features and the swapchain extension enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the physical device has no unified queue family or
    /// device creation fails.
    pub fn new(
        instance: &Arc<Instance>,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> RhiResult<Arc<Self>> {
        let queue_family = physical_device_info.queue_family().ok_or_else(|| {
            RhiError::NoSuitableGpu(format!(
                "'{}' has no queue family that supports graphics and present",
                physical_device_info.device_name()
            ))
        })?;

        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            REQUIRED_DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        info!(
            "Logical device created on '{}' (queue family {})",
            physical_device_info.device_name(),
            queue_family
        );
        debug!("Enabled device extensions: {:?}", REQUIRED_DEVICE_EXTENSIONS);

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            queue,
            queue_family,
            instance: Arc::clone(instance),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics + present queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Returns the family index of [`Device::queue`].
    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// The instance this device was created from.
    #[inline]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Blocks until all outstanding work on the device has completed.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync and the remaining fields are plain handles.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
