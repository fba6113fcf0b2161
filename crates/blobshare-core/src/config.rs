//! blobshare.toml configuration parser.
//!
//! Every recognized option is listed here with an explicit default, so an
//! empty file (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlobshareConfig {
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
    pub validator: ValidatorConfig,
}

/// Tunables for the weight controller, scorer, and batch selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity ceiling used to normalize item sizes (KB).
    pub max_utilization_kb: f64,
    /// Smoothing factor for the bid weight.
    pub lambda_bid: f64,
    /// Smoothing factor for the wait weight.
    pub lambda_wait: f64,
    /// Smoothing factor for the utilization weight.
    pub lambda_utilization: f64,
    /// Acceptable median wait, in scheduling rounds.
    pub target_wait_rounds: f64,
    /// Hard per-batch admission cap (KB).
    pub capacity_kb: f64,
    /// Accumulated size that triggers a flush (KB).
    pub flush_threshold_kb: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_utilization_kb: 128.0,
            lambda_bid: 0.5,
            lambda_wait: 0.9,
            lambda_utilization: 0.7,
            target_wait_rounds: 10.0,
            capacity_kb: 120.0,
            flush_threshold_kb: 120.0,
        }
    }
}

impl SchedulerConfig {
    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, lambda) in [
            ("lambda_bid", self.lambda_bid),
            ("lambda_wait", self.lambda_wait),
            ("lambda_utilization", self.lambda_utilization),
        ] {
            if !(0.0..=1.0).contains(&lambda) {
                anyhow::bail!("{name} must be within [0, 1], got {lambda}");
            }
        }
        for (name, value) in [
            ("max_utilization_kb", self.max_utilization_kb),
            ("target_wait_rounds", self.target_wait_rounds),
            ("capacity_kb", self.capacity_kb),
            ("flush_threshold_kb", self.flush_threshold_kb),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{name} must be a non-negative number, got {value}");
            }
        }
        Ok(())
    }
}

/// Bounded retry for transport hand-off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Accept signatures without verification. Off unless an upstream
    /// gateway has already authenticated the producer.
    pub trust_signatures: bool,
    /// Available funds per producer identity.
    pub balances: HashMap<String, f64>,
}

impl BlobshareConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: BlobshareConfig = toml::from_str(content)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = BlobshareConfig::parse("").unwrap();
        assert_eq!(config, BlobshareConfig::default());
        assert_eq!(config.scheduler.capacity_kb, 120.0);
        assert_eq!(config.scheduler.max_utilization_kb, 128.0);
    }

    #[test]
    fn test_parse_partial_scheduler() {
        let toml_str = r#"
[scheduler]
lambda_bid = 0.1
capacity_kb = 64.0

[validator]
trust_signatures = true

[validator.balances]
"0xabc" = 2.5
"#;
        let config = BlobshareConfig::parse(toml_str).unwrap();
        assert_eq!(config.scheduler.lambda_bid, 0.1);
        assert_eq!(config.scheduler.capacity_kb, 64.0);
        assert_eq!(config.scheduler.lambda_wait, 0.9);
        assert!(config.validator.trust_signatures);
        assert_eq!(config.validator.balances.get("0xabc"), Some(&2.5));
    }

    #[test]
    fn test_rejects_lambda_out_of_range() {
        let toml_str = r#"
[scheduler]
lambda_wait = 1.5
"#;
        let err = BlobshareConfig::parse(toml_str).unwrap_err();
        assert!(err.to_string().contains("lambda_wait"));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = BlobshareConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("flush_threshold_kb"));
        assert_eq!(BlobshareConfig::parse(&toml_str).unwrap(), config);
    }
}
