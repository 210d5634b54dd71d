//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,vulkraft=debug";

/// Initialize the logging system with tracing.
///
/// Filtering comes from `RUST_LOG` when present, otherwise
/// `info,vulkraft=debug`. Output includes targets and thread ids.
///
/// # Example
/// ```
/// vulkraft_core::init_logging();
/// tracing::info!("Vulkraft starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
