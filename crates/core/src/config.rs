//! Application configuration.
//!
//! Defaults match the stock Vulkraft window. Individual values can be
//! overridden through `VULKRAFT_*` environment variables.

use std::str::FromStr;

use crate::error::{Error, Result};

const ENV_WIDTH: &str = "VULKRAFT_WIDTH";
const ENV_HEIGHT: &str = "VULKRAFT_HEIGHT";
const ENV_VALIDATION: &str = "VULKRAFT_VALIDATION";
const ENV_COLOR_STEP: &str = "VULKRAFT_COLOR_STEP";

/// Top-level configuration for the Vulkraft application.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in physical pixels.
    pub width: u32,
    /// Initial window height in physical pixels.
    pub height: u32,
    /// Whether the user may resize the window.
    pub resizable: bool,
    /// Enable the Khronos validation layer and debug messenger.
    pub enable_validation: bool,
    /// Per-frame increment of the active clear color channel.
    pub color_step: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Vulkraft".to_string(),
            width: 800,
            height: 600,
            resizable: true,
            enable_validation: cfg!(debug_assertions),
            color_step: 0.1,
        }
    }
}

impl AppConfig {
    /// Default configuration with overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an override is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Default configuration with overrides resolved through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(width) = lookup(ENV_WIDTH) {
            config.width = parse_extent(ENV_WIDTH, &width)?;
        }
        if let Some(height) = lookup(ENV_HEIGHT) {
            config.height = parse_extent(ENV_HEIGHT, &height)?;
        }
        if let Some(validation) = lookup(ENV_VALIDATION) {
            config.enable_validation = parse_flag(ENV_VALIDATION, &validation)?;
        }
        if let Some(step) = lookup(ENV_COLOR_STEP) {
            let step = parse_value::<f32>(ENV_COLOR_STEP, &step)?;
            if !(step > 0.0 && step <= 1.0) {
                return Err(Error::Config(format!(
                    "{ENV_COLOR_STEP} must be in (0, 1], got {step}"
                )));
            }
            config.color_step = step;
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has an invalid value '{raw}'")))
}

fn parse_extent(key: &str, raw: &str) -> Result<u32> {
    match parse_value::<u32>(key, raw)? {
        0 => Err(Error::Config(format!("{key} must be greater than zero"))),
        value => Ok(value),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(Error::Config(format!(
            "{key} must be a boolean flag, got '{raw}'"
        ))),
    }
}
