//! Renderer error type.

use ash::vk;
use thiserror::Error;

use vulkraft_rhi::RhiError;

use crate::session::FrameState;

/// Errors raised by the frame loop and its setup.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Device, surface or swapchain bootstrap failed
    #[error("subsystem init error: {0}")]
    Init(String),

    /// A Vulkan or RHI call failed
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// A frame session operation was called out of order
    #[error("cannot {op} a frame session in state {state:?}")]
    InvalidFrameState {
        op: &'static str,
        state: FrameState,
    },

    /// The renderer was already torn down
    #[error("renderer has been shut down")]
    ShutDown,
}

impl From<vk::Result> for RenderError {
    fn from(result: vk::Result) -> Self {
        RenderError::Rhi(RhiError::VulkanError(result))
    }
}

impl RenderError {
    /// Wraps any displayable failure as an init error.
    pub(crate) fn init(err: impl std::fmt::Display) -> Self {
        RenderError::Init(err.to_string())
    }
}

/// Result type alias for renderer operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
