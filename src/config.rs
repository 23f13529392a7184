//! Configuration loading, layering, and validation.
//!
//! Settings come from three layers, each overriding the one before:
//!
//! ```text
//! stock defaults          (compiled in)
//!   └─ imgsquash.toml     (working directory, or --config FILE)
//!        └─ CLI flags     (--quality, --resize, ...)
//! ```
//!
//! Layers are merged as raw TOML with [`merge_toml`] and only then
//! deserialized, so a file or flag needs to name just the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! quality = 80            # 1-100, encoder quality hint
//! resize = "original"     # original | half | three-quarters | custom
//! # width = 1200          # custom only
//! # height = 800          # custom only
//! format = "original"     # original | jpeg | png | webp
//!
//! [limits]
//! max_file_size = 10485760  # bytes per input file
//!
//! [processing]
//! on_error = "abort"      # abort | skip
//! parallel = false        # run images on a worker pool
//! # max_processes = 4     # worker cap (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CompressionSettings, OutputFormat, ResizeMode};
use crate::pipeline::FailurePolicy;
use crate::validation::MAX_INPUT_BYTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "imgsquash.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Application configuration loaded from `imgsquash.toml`.
///
/// All fields have defaults; a config file only lists what it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Compression settings snapshotted for each run.
    pub compression: CompressionSettings,
    /// Input acceptance limits.
    pub limits: LimitsConfig,
    /// Batch execution settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Quality range is enforced while deserializing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.width == Some(0) || self.compression.height == Some(0) {
            return Err(ConfigError::Validation(
                "compression.width and compression.height must be positive".into(),
            ));
        }
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_file_size must be positive".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Input acceptance limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted input file, in bytes.
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_INPUT_BYTES,
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Process images on a worker pool instead of one at a time.
    pub parallel: bool,
    /// What a failed image does to the rest of the batch.
    pub on_error: FailurePolicy,
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

/// Command-line overrides, applied as the last config layer.
///
/// Only flags the user actually passed are set.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub quality: Option<u32>,
    pub resize: Option<ResizeMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<OutputFormat>,
    pub on_error: Option<FailurePolicy>,
    pub parallel: bool,
    pub max_processes: Option<usize>,
}

impl Overrides {
    /// Render the overrides as a sparse TOML table for [`merge_toml`].
    ///
    /// A custom width or height without an explicit resize mode implies
    /// `resize = "custom"`.
    pub fn to_overlay(&self) -> toml::Value {
        let mut compression = toml::Table::new();
        if let Some(q) = self.quality {
            compression.insert("quality".into(), toml::Value::Integer(q.into()));
        }
        let resize = match (self.resize, self.width.or(self.height)) {
            (Some(mode), _) => Some(mode),
            (None, Some(_)) => Some(ResizeMode::Custom),
            (None, None) => None,
        };
        if let Some(mode) = resize {
            compression.insert("resize".into(), toml::Value::String(mode.to_string()));
        }
        if let Some(w) = self.width {
            compression.insert("width".into(), toml::Value::Integer(w.into()));
        }
        if let Some(h) = self.height {
            compression.insert("height".into(), toml::Value::Integer(h.into()));
        }
        if let Some(format) = self.format {
            compression.insert("format".into(), toml::Value::String(format.to_string()));
        }

        let mut processing = toml::Table::new();
        if let Some(policy) = self.on_error {
            processing.insert("on_error".into(), toml::Value::String(policy.to_string()));
        }
        if self.parallel {
            processing.insert("parallel".into(), toml::Value::Boolean(true));
        }
        if let Some(n) = self.max_processes {
            let n = i64::try_from(n).unwrap_or(i64::MAX);
            processing.insert("max_processes".into(), toml::Value::Integer(n));
        }

        let mut root = toml::Table::new();
        if !compression.is_empty() {
            root.insert("compression".into(), toml::Value::Table(compression));
        }
        if !processing.is_empty() {
            root.insert("processing".into(), toml::Value::Table(processing));
        }
        toml::Value::Table(root)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
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

/// Read a config file as a raw TOML value. The file must exist.
pub fn load_raw_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load `imgsquash.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    load_raw_config_file(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `imgsquash.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Resolve all three layers: stock defaults, a config file, and CLI overrides.
///
/// `explicit` names a config file that must exist; otherwise `imgsquash.toml`
/// in `dir` is used when present.
pub fn load_layered(
    explicit: Option<&Path>,
    dir: &Path,
    overrides: &Overrides,
) -> Result<AppConfig, ConfigError> {
    let file = match explicit {
        Some(path) => Some(load_raw_config_file(path)?),
        None => load_raw_config(dir)?,
    };
    let base = match file {
        Some(file) => merge_toml(stock_defaults_value(), file),
        None => stock_defaults_value(),
    };
    resolve_config(base, Some(overrides.to_overlay()))
}

/// Returns a fully-commented stock `imgsquash.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgsquash configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Lookup order (later wins):
#   stock defaults -> ./imgsquash.toml (or --config FILE) -> command-line flags
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Encoder quality, 1 (smallest) to 100 (best). Passed to the encoder as
# quality / 100. Lossless formats (PNG, WebP) ignore it.
quality = 80

# How output dimensions are derived from the source:
#   original        keep the source size
#   half            50% of each side, rounded down
#   three-quarters  75% of each side, rounded down
#   custom          use width and/or height below; with only one of them
#                   the other follows the source aspect ratio
resize = "original"

# Custom target size in pixels (only used with resize = "custom").
# width = 1200
# height = 800

# Output format: original (keep the input's type), jpeg, png, or webp.
format = "original"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted input file in bytes (10 MiB).
max_file_size = 10485760

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# What a failed image does to the batch:
#   abort  stop and keep nothing from this run
#   skip   report the failure and continue with the rest
on_error = "abort"

# Run images on a worker pool. Output order still matches input order.
parallel = false

# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
