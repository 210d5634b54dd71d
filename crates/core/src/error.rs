//! Error types shared by the window service and the application.

use thiserror::Error;

/// Main error type for the non-GPU parts of Vulkraft.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan surface errors raised by the window service
    #[error("Surface error: {0}")]
    Surface(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the shared Error type.
pub type Result<T> = std::result::Result<T, Error>;
