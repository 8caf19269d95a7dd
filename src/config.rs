//! Pipeline configuration module.
//!
//! Handles loading and validating `pixelsieve.toml`. Every knob is a named
//! field with a documented default - there is no pass-through key/value bag.
//! The resolved config is validated once at run start and immutable for the
//! lifetime of the run; its fingerprint is part of the run identity, so a
//! resume with a different config is refused instead of silently mixed.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! min_resolution = 800          # Minimum px on the shorter edge (inclusive)
//! output_format = "webp"        # webp | jpeg | png
//! quality = 90                  # Encoder quality 1-100, passed through
//! rename_prefix = "img"         # Prefix for assigned output names
//! rename_width = 6              # Zero-padded sequence width (img000001)
//! resize_if_larger = false      # Downscale oversized images on convert
//! max_dimensions = [3840, 2160] # Bounds used when resize_if_larger is set
//! keep_work_dir = false         # Keep spooled intermediates after packaging
//!
//! [workers]
//! count = 8                     # Parallel workers (clamped to CPU cores)
//!
//! [memory]
//! ceiling_items = 100           # Max in-flight items across the pool
//! ceiling_bytes = 0             # Optional byte bound (0 = disabled)
//!
//! [retry]
//! base_ms = 1000                # First backoff delay
//! cap_ms = 30000                # Backoff ceiling
//! max_attempts = 5              # Attempts before a fetch is abandoned
//!
//! [checkpoint]
//! interval_items = 25           # Intra-phase checkpoint frequency
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config mismatch: {0}")]
    Mismatch(String),
}

/// Target encoding for the Convert phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension for the packaged output.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Pipeline configuration loaded from `pixelsieve.toml`.
///
/// All fields have defaults; user files need only override what they want.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Minimum pixel count on the shorter edge. Inclusive: an image whose
    /// `min(width, height)` equals this value passes the filter.
    pub min_resolution: u32,
    pub output_format: OutputFormat,
    /// Encoder quality 1-100. Passed through to the codec unchanged.
    pub quality: u32,
    /// Prefix for assigned output names (`img` → `img000001`).
    pub rename_prefix: String,
    /// Zero-padded width of the sequence part of assigned names.
    pub rename_width: usize,
    /// When set, Convert downscales images exceeding `max_dimensions`,
    /// preserving aspect ratio. Off by default: conversions are 1:1.
    pub resize_if_larger: bool,
    /// `[width, height]` bounds consulted only when `resize_if_larger`.
    pub max_dimensions: [u32; 2],
    /// Keep the run's spooled intermediates after a successful package.
    pub keep_work_dir: bool,
    pub workers: WorkersConfig,
    pub memory: MemoryConfig,
    pub retry: RetryConfig,
    pub checkpoint: CheckpointConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_resolution: 800,
            output_format: OutputFormat::Webp,
            quality: 90,
            rename_prefix: "img".to_string(),
            rename_width: 6,
            resize_if_larger: false,
            max_dimensions: [3840, 2160],
            keep_work_dir: false,
            workers: WorkersConfig::default(),
            memory: MemoryConfig::default(),
            retry: RetryConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkersConfig {
    /// Parallel workers per phase. Clamped to the number of CPU cores -
    /// users can constrain down, not up.
    pub count: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { count: 8 }
    }
}

/// In-flight memory bounds enforced by the governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum items admitted to the pool at once. Item-count bounding is
    /// the primary ceiling; raw byte accounting is unreliable across
    /// codecs, so bytes are only a refinement.
    pub ceiling_items: usize,
    /// Optional in-flight byte bound. `0` disables it.
    pub ceiling_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ceiling_items: 100,
            ceiling_bytes: 0,
        }
    }
}

/// Backoff policy for network-bound fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 30_000,
            max_attempts: 5,
        }
    }
}

/// Intra-phase checkpoint frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointConfig {
    /// Save a checkpoint every N item completions within a phase. A crash
    /// loses at most one interval's worth of work.
    pub interval_items: u32,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self { interval_items: 25 }
    }
}

impl PipelineConfig {
    /// Load config from a TOML file, or defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.min_resolution == 0 {
            return Err(ConfigError::Validation(
                "min_resolution must be non-zero".into(),
            ));
        }
        if self.rename_width == 0 || self.rename_width > 9 {
            return Err(ConfigError::Validation("rename_width must be 1-9".into()));
        }
        if self.rename_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "rename_prefix must not be empty".into(),
            ));
        }
        if self.max_dimensions[0] == 0 || self.max_dimensions[1] == 0 {
            return Err(ConfigError::Validation(
                "max_dimensions values must be non-zero".into(),
            ));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::Validation(
                "workers.count must be non-zero".into(),
            ));
        }
        if self.memory.ceiling_items == 0 {
            return Err(ConfigError::Validation(
                "memory.ceiling_items must be non-zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be non-zero".into(),
            ));
        }
        if self.checkpoint.interval_items == 0 {
            return Err(ConfigError::Validation(
                "checkpoint.interval_items must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// SHA-256 fingerprint of the resolved config.
    ///
    /// Part of the run identity: identical (source, config) always maps to
    /// the same run id, so re-invoking the same command resumes. The JSON
    /// encoding has a stable field order, making the digest deterministic.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("config serializes");
        let digest = Sha256::digest(json.as_bytes());
        format!("{digest:x}")
    }
}

/// Resolve the effective worker count from config.
///
/// Clamped to available cores - user can constrain down, not up.
pub fn effective_workers(config: &WorkersConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.count.min(cores).max(1)
}

/// Print-ready stock config with every option at its default, documented.
pub fn stock_config_toml() -> String {
    let mut out = String::new();
    out.push_str("# pixelsieve configuration - all values shown are the defaults\n\n");
    out.push_str("min_resolution = 800          # Minimum px on the shorter edge (inclusive)\n");
    out.push_str("output_format = \"webp\"        # webp | jpeg | png\n");
    out.push_str("quality = 90                  # Encoder quality 1-100\n");
    out.push_str("rename_prefix = \"img\"         # Assigned name prefix\n");
    out.push_str("rename_width = 6              # Zero-padded sequence width\n");
    out.push_str("resize_if_larger = false      # Downscale oversized images on convert\n");
    out.push_str("max_dimensions = [3840, 2160] # Used only when resize_if_larger\n");
    out.push_str("keep_work_dir = false         # Keep intermediates after packaging\n\n");
    out.push_str("[workers]\n");
    out.push_str("count = 8                     # Clamped to CPU cores\n\n");
    out.push_str("[memory]\n");
    out.push_str("ceiling_items = 100           # Max in-flight items\n");
    out.push_str("ceiling_bytes = 0             # Optional byte bound (0 = off)\n\n");
    out.push_str("[retry]\n");
    out.push_str("base_ms = 1000\n");
    out.push_str("cap_ms = 30000\n");
    out.push_str("max_attempts = 5\n\n");
    out.push_str("[checkpoint]\n");
    out.push_str("interval_items = 25           # Items between intra-phase checkpoints\n");
    out
}
