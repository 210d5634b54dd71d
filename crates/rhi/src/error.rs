//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No GPU meets the device requirements
    #[error("No suitable GPU found: {0}")]
    NoSuitableGpu(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface query or creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Pipeline configuration is missing required fields
    #[error("Incomplete pipeline config, missing: {}", .0.join(", "))]
    IncompletePipeline(Vec<&'static str>),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
