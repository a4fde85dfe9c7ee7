//! Engine configuration.
//!
//! Handles loading, validating and merging `imagecache.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! max_image_dimension = 1600   # Longer-edge bound for save-for-web copies
//!
//! [cache]
//! sliding_expiration_secs = 1200
//!
//! [colors]
//! background = "FFFFFF"        # Letterbox fill when a request names none
//! placeholder = "808080"       # Fill for missing sources
//!
//! [encoding]
//! jpeg_quality = 75
//! high_quality_jpeg_quality = 95
//!
//! [processing]
//! max_processes = 4            # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncoderSettings, Quality, Rgb};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "imagecache.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `imagecache.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Longer-edge bound applied by save-for-web.
    pub max_image_dimension: u32,
    pub cache: CacheConfig,
    pub colors: ColorConfig,
    pub encoding: EncodingConfig,
    pub processing: ProcessingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 1600,
            cache: CacheConfig::default(),
            colors: ColorConfig::default(),
            encoding: EncodingConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_image_dimension == 0 {
            return Err(ConfigError::Validation(
                "max_image_dimension must be non-zero".into(),
            ));
        }
        if self.cache.sliding_expiration_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.sliding_expiration_secs must be non-zero".into(),
            ));
        }
        for (key, value) in [
            ("encoding.jpeg_quality", self.encoding.jpeg_quality),
            (
                "encoding.high_quality_jpeg_quality",
                self.encoding.high_quality_jpeg_quality,
            ),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.cache.sliding_expiration_secs)
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            jpeg_quality: Quality::new(self.encoding.jpeg_quality),
            high_quality_jpeg_quality: Quality::new(self.encoding.high_quality_jpeg_quality),
        }
    }
}

/// Derived-image cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Seconds an entry survives without being requested.
    pub sliding_expiration_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sliding_expiration_secs: 1200,
        }
    }
}

/// Fill colours, as six hex digits without `#`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub background: Rgb,
    pub placeholder: Rgb,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: Rgb::WHITE,
            placeholder: Rgb::GRAY,
        }
    }
}

/// Lossy encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub jpeg_quality: u32,
    pub high_quality_jpeg_quality: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            high_quality_jpeg_quality: 95,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for batch rendering.
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
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EngineConfig::default()).expect("default config must serialize")
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

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a specific config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `imagecache.toml` from `dir`, falling back to stock defaults when
/// the directory has none.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Returns a fully-commented stock `imagecache.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imagecache configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Longer-edge bound (pixels) for save-for-web copies. Smaller sources are
# never upscaled.
max_image_dimension = 1600

# ---------------------------------------------------------------------------
# Derived-image cache
# ---------------------------------------------------------------------------
[cache]
# Seconds an entry survives without being requested. Every hit restarts
# the countdown.
sliding_expiration_secs = 1200

# ---------------------------------------------------------------------------
# Colours (six hex digits, no leading '#')
# ---------------------------------------------------------------------------
[colors]
# Letterbox fill for fit and fill-crop when a request names no background.
background = "FFFFFF"
# Fill used in place of a missing source.
placeholder = "808080"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Quality (1-100) for the jpeg output format.
jpeg_quality = 75
# Quality (1-100) for the hq-jpeg output format.
high_quality_jpeg_quality = 95

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel workers for batch rendering.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4
"##
}
