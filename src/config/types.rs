//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::common::types::Address;
use crate::position::aggregator::{
    AggregatorSettings, DEFAULT_READ_TIMEOUT_MS, DEFAULT_STALENESS_BOUND_MS,
};
use crate::position::scheduler::DEFAULT_COOLDOWN_MS;
use crate::position::RetryPolicy;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cooldown, staleness and read timeout
    #[serde(default)]
    pub refresh: RefreshSettings,
    /// Retry policy for transient read failures
    #[serde(default)]
    pub retry: RetryPolicy,
    /// On-disk snapshot cache
    #[serde(default)]
    pub cache: CacheSettings,
    /// Collateral token used for stakes and valuation
    #[serde(default)]
    pub collateral: CollateralSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl EngineConfig {
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            staleness_bound_ms: self.refresh.staleness_bound_ms,
            read_timeout_ms: self.refresh.read_timeout_ms,
            retry: self.retry,
        }
    }
}

/// Refresh gating settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Minimum interval between refreshes of one (market, user) pair
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Cached snapshots younger than this are served without a refresh
    #[serde(default = "default_staleness_bound_ms")]
    pub staleness_bound_ms: u64,
    /// Timeout for each contract read (0 disables it)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            staleness_bound_ms: default_staleness_bound_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}

fn default_staleness_bound_ms() -> u64 {
    DEFAULT_STALENESS_BOUND_MS
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Snapshot cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory holding one JSON document per (market, user)
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
        }
    }
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from("position-cache")
}

/// Collateral token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralSettings {
    /// Token decimals used to convert typed amounts to smallest units
    #[serde(default = "default_collateral_decimals")]
    pub decimals: u32,
    /// Display symbol
    #[serde(default = "default_collateral_symbol")]
    pub symbol: String,
    /// Token contract; when set, stakes are checked against the user's
    /// allowance for the market before submission
    #[serde(default)]
    pub token: Option<Address>,
}

impl Default for CollateralSettings {
    fn default() -> Self {
        Self {
            decimals: default_collateral_decimals(),
            symbol: default_collateral_symbol(),
            token: None,
        }
    }
}

fn default_collateral_decimals() -> u32 {
    6
}

fn default_collateral_symbol() -> String {
    "USDC".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.refresh.cooldown_ms, 30_000);
        assert_eq!(config.refresh.staleness_bound_ms, 3_600_000);
        assert_eq!(config.refresh.read_timeout_ms, 10_000);
        assert_eq!(config.retry, RetryPolicy::new(3, 500));
        assert_eq!(config.cache.directory, PathBuf::from("position-cache"));
        assert_eq!(config.collateral.decimals, 6);
        assert_eq!(config.collateral.symbol, "USDC");
        assert_eq!(config.collateral.token, None);
        assert_eq!(config.settings.log_level, "info");
    }

    #[test]
    fn test_collateral_token_parsed_from_hex() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"collateral": {"token": "0xf817257fed379853cDe0fa4F97AB987181B1E5Ea"}}"#,
        )
        .unwrap();
        let token = config.collateral.token.unwrap();
        assert_eq!(token.to_string(), "0xf817257fed379853cde0fa4f97ab987181b1e5ea");
        assert_eq!(config.collateral.decimals, 6);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"refresh": {"cooldown_ms": 5000}, "retry": {"attempts": 1}}"#)
                .unwrap();
        assert_eq!(config.refresh.cooldown_ms, 5_000);
        assert_eq!(config.refresh.staleness_bound_ms, 3_600_000);
        assert_eq!(config.retry.attempts, 1);
        assert_eq!(config.retry.backoff_ms, 500);

        let settings = config.aggregator_settings();
        assert_eq!(settings.read_timeout_ms, 10_000);
        assert_eq!(settings.retry, RetryPolicy::new(1, 500));
    }
}
