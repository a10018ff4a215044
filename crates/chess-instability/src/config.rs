//! Analyzer configuration.
//!
//! Loaded from `instability.toml` when present; every field has a
//! default so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// The configuration file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How mate scores enter the swing aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MatePolicy {
    /// Fold mate-in-n into the sequence as a signed fixed magnitude.
    Convert {
        /// Magnitude in centipawns.
        centipawns: i32,
    },
    /// Drop mate readings from the sequence entirely.
    Exclude,
}

impl Default for MatePolicy {
    fn default() -> Self {
        MatePolicy::Convert { centipawns: 10_000 }
    }
}

/// Configuration for [`InstabilityAnalyzer`](crate::InstabilityAnalyzer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Path to the UCI engine executable.
    /// Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub engine_path: String,
    /// Upper bound accepted for the `depth` parameter.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Upper bound accepted for the sample count.
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,
    /// Cache database location; `None` falls back to an in-memory cache.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Retries granted to transient cache failures.
    #[serde(default = "default_cache_retries")]
    pub cache_retries: u32,
    /// Sleep between cache retry attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Mate score handling in the aggregation.
    #[serde(default)]
    pub mate_policy: MatePolicy,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_max_depth() -> u32 {
    128
}

fn default_max_samples() -> u32 {
    512
}

fn default_cache_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            max_depth: default_max_depth(),
            max_samples: default_max_samples(),
            cache_path: None,
            cache_retries: default_cache_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            mate_policy: MatePolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Loads the configuration from disk.
    ///
    /// Missing file means defaults; an unreadable or malformed file is
    /// an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("instability.toml")
    }
}
