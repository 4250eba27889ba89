//! Analysis configuration
//!
//! Bucket width, sample sizes and the policies for recoverable input faults.

use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::{BucketGranularity, DEFAULT_BUCKET_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable pointing at the TOML config file.
pub const CONFIG_PATH_ENV: &str = "APTLAB_CONFIG_PATH";

/// Number of trades the probability tracker evaluates by default.
pub const DEFAULT_TRADE_SAMPLE_SIZE: usize = 50_000;

/// What to do when the trade tape is shorter than the sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTapePolicy {
    /// Evaluate the trades that are available.
    #[default]
    Clamp,
    /// Abort with `InsufficientHistory`.
    Fail,
}

/// What to do when a level has zero combined bid and ask size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Abort with `DegenerateBook`.
    #[default]
    Fail,
    /// Drop the row (all-orders) or snapshot (top-of-book) and continue.
    SkipLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Width of the martingale buckets in seconds.
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: u64,

    /// Number of leading trades used for the probability evolution.
    #[serde(default = "default_trade_sample_size")]
    pub trade_sample_size: usize,

    #[serde(default)]
    pub short_tape_policy: ShortTapePolicy,

    #[serde(default)]
    pub degenerate_policy: DegeneratePolicy,

    /// Reject snapshots with `bid > ask` at any level.
    #[serde(default = "default_true")]
    pub reject_crossed_levels: bool,

    /// Round the overall Roll spread to this many decimals (unrounded if unset).
    #[serde(default)]
    pub overall_spread_decimals: Option<u32>,

    /// Keep calendar bins with no snapshots in the top-of-book tables.
    #[serde(default = "default_true")]
    pub emit_empty_bins: bool,
}

fn default_bucket_secs() -> u64 {
    DEFAULT_BUCKET_SECS
}

fn default_trade_sample_size() -> usize {
    DEFAULT_TRADE_SAMPLE_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bucket_secs: DEFAULT_BUCKET_SECS,
            trade_sample_size: DEFAULT_TRADE_SAMPLE_SIZE,
            short_tape_policy: ShortTapePolicy::default(),
            degenerate_policy: DegeneratePolicy::default(),
            reject_crossed_levels: true,
            overall_spread_decimals: None,
            emit_empty_bins: true,
        }
    }
}

impl AnalysisConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::io(path.display().to_string(), e))?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `APTLAB_CONFIG_PATH`, or fall back to defaults.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "aptlab.toml".to_string());
        Self::load_or_default(path)
    }

    /// Load `path` if it exists. A missing file quietly yields the defaults;
    /// a file that fails to parse or validate falls back with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!(
                "Ignoring config {} and using defaults: {}",
                path.display(),
                e
            );
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.granularity()?;
        if self.trade_sample_size == 0 {
            return Err(AnalysisError::Config {
                message: "trade_sample_size must be positive".to_string(),
            });
        }
        if let Some(decimals) = self.overall_spread_decimals {
            if decimals > 15 {
                return Err(AnalysisError::Config {
                    message: format!("overall_spread_decimals {} exceeds f64 precision", decimals),
                });
            }
        }
        Ok(())
    }

    pub fn granularity(&self) -> Result<BucketGranularity, AnalysisError> {
        BucketGranularity::from_secs(self.bucket_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bucket_secs, 60);
        assert_eq!(config.trade_sample_size, 50_000);
        assert_eq!(config.short_tape_policy, ShortTapePolicy::Clamp);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Fail);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            bucket_secs = 300
            short_tape_policy = "fail"
            degenerate_policy = "skip_level"
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket_secs, 300);
        assert_eq!(config.trade_sample_size, 50_000);
        assert_eq!(config.short_tape_policy, ShortTapePolicy::Fail);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::SkipLevel);
        assert!(config.emit_empty_bins);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AnalysisConfig {
            overall_spread_decimals: Some(6),
            ..AnalysisConfig::default()
        };
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: AnalysisConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();

        let missing = dir.path().join("aptlab.toml");
        assert_eq!(AnalysisConfig::load_or_default(&missing), AnalysisConfig::default());

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "bucket_secs = 0\n").unwrap();
        assert!(AnalysisConfig::load(&invalid).is_err());
        assert_eq!(AnalysisConfig::load_or_default(&invalid), AnalysisConfig::default());

        let typo = dir.path().join("typo.toml");
        std::fs::write(&typo, "bucket_secs = = 5\n").unwrap();
        assert_eq!(AnalysisConfig::load_or_default(&typo), AnalysisConfig::default());

        let valid = dir.path().join("valid.toml");
        std::fs::write(&valid, "bucket_secs = 300\n").unwrap();
        assert_eq!(AnalysisConfig::load_or_default(&valid).bucket_secs, 300);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_bucket = AnalysisConfig {
            bucket_secs: 0,
            ..AnalysisConfig::default()
        };
        assert!(zero_bucket.validate().is_err());

        let zero_sample = AnalysisConfig {
            trade_sample_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(zero_sample.validate().is_err());
    }
}
