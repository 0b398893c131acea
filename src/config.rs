//! Service configuration.
//!
//! Settings are read from a TOML file and layered over the stock defaults:
//! the file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [throttler]
//! enabled = true
//! allowed_requests = 700    # Requests per window per client
//! minutes = 3               # Window length
//! ban_time = 60             # Ban length in minutes
//! whitelist = []            # Client IPs that are never throttled
//!
//! [fetch]
//! max_image_size = 0        # Largest source in bytes (0 = unlimited)
//!
//! [output]
//! gif_fallback = true       # Re-encode through the raster shim for GIF requests
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::throttle::ThrottlePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration.
///
/// All fields have defaults; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub throttler: ThrottlerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttler.minutes == 0 {
            return Err(ConfigError::Validation(
                "throttler.minutes must be non-zero".into(),
            ));
        }
        if self.throttler.ban_time == 0 {
            return Err(ConfigError::Validation(
                "throttler.ban_time must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Per-client rate limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottlerConfig {
    pub enabled: bool,
    pub allowed_requests: u32,
    /// Window length in minutes.
    pub minutes: u64,
    /// Ban length in minutes.
    pub ban_time: u64,
    pub whitelist: Vec<String>,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_requests: 700,
            minutes: 3,
            ban_time: 60,
            whitelist: Vec::new(),
        }
    }
}

impl ThrottlerConfig {
    pub fn policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            allowed_requests: self.allowed_requests,
            window: Duration::from_secs(self.minutes * 60),
            ban_time: Duration::from_secs(self.ban_time * 60),
            whitelist: self.whitelist.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Largest accepted source in bytes; 0 disables the limit.
    pub max_image_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub gif_fallback: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { gif_fallback: true }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let overlay = match path {
        Some(path) => Some(toml::from_str::<toml::Value>(&fs::read_to_string(path)?)?),
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgchain configuration
# ======================
#
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Rate limiting
# ---------------------------------------------------------------------------
[throttler]
# Turn per-client throttling on or off.
enabled = true

# Requests a single client may make per window.
allowed_requests = 700

# Window length in minutes.
minutes = 3

# How long an offending client stays banned, in minutes.
ban_time = 60

# Client IPs that are never throttled.
whitelist = []

# ---------------------------------------------------------------------------
# Source retrieval
# ---------------------------------------------------------------------------
[fetch]
# Largest accepted source image in bytes. 0 = unlimited.
max_image_size = 0

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# The pixel engine cannot write GIF. When a request asks for GIF, re-encode
# the engine's output through the raster shim. On failure the engine's own
# output is served instead.
gif_fallback = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit for auto-detection (= number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}
