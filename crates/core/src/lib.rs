//! Shared foundations for the Vulkraft crates.
//!
//! - Error type and result alias
//! - Logging initialization
//! - Application configuration
//! - Frame timing and statistics

mod config;
mod error;
mod logging;
mod timer;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::{FrameReport, FrameStats, Timer};
