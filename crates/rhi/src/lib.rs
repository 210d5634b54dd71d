//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! A thin layer over `ash` covering what the frame loop needs:
//! - Instance, debug messenger and physical device selection
//! - Logical device with a single graphics + present queue
//! - Swapchain creation policy
//! - Image barriers, queue submissions and dynamic rendering descriptors
//! - Shader modules, vertex layouts and graphics pipelines

mod error;

pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
