//! Runtime tunables shared by every dashboard.
//!
//! Defaults are overridable through environment variables and read once per
//! process.

use crate::shared::risk::RiskTier;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

/// Default USD notional at which a trade counts as "large" (env: LARGE_TRADE_THRESHOLD)
pub const DEFAULT_LARGE_TRADE_THRESHOLD: f64 = 100_000.0;

/// Default leaderboard length (env: TOP_N)
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Trades with `value_usd` at or above this are counted as large prints
    pub large_trade_threshold_usd: f64,
    /// Number of rows returned by the Top-N helpers when the caller has no preference
    pub top_n: usize,
    /// Positions in this tier or any riskier one count as "at risk" (env: AT_RISK_TIER)
    pub at_risk_tier: RiskTier,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            large_trade_threshold_usd: DEFAULT_LARGE_TRADE_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            at_risk_tier: RiskTier::High,
        }
    }
}

impl AnalyticsConfig {
    /// Build a configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            large_trade_threshold_usd: parse_var(
                &lookup,
                "LARGE_TRADE_THRESHOLD",
                defaults.large_trade_threshold_usd,
            ),
            top_n: parse_var(&lookup, "TOP_N", defaults.top_n),
            at_risk_tier: parse_var(&lookup, "AT_RISK_TIER", defaults.at_risk_tier),
        }
    }

    /// Process-wide configuration, read from the environment on first use
    pub fn global() -> &'static AnalyticsConfig {
        static CONFIG: OnceLock<AnalyticsConfig> = OnceLock::new();
        CONFIG.get_or_init(Self::from_env)
    }

    pub fn with_large_trade_threshold(mut self, threshold_usd: f64) -> Self {
        self.large_trade_threshold_usd = threshold_usd;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_at_risk_tier(mut self, tier: RiskTier) -> Self {
        self.at_risk_tier = tier;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(%key, %raw, "ignoring unparseable config value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.large_trade_threshold_usd, 100_000.0);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.at_risk_tier, RiskTier::High);
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("LARGE_TRADE_THRESHOLD", "250000"),
            ("TOP_N", " 25 "),
            ("AT_RISK_TIER", "medium"),
        ]
        .into_iter()
        .collect();

        let config = AnalyticsConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.large_trade_threshold_usd, 250_000.0);
        assert_eq!(config.top_n, 25);
        assert_eq!(config.at_risk_tier, RiskTier::Medium);
    }

    #[test]
    fn test_config_bad_values_fall_back() {
        let config = AnalyticsConfig::from_lookup(|key| match key {
            "TOP_N" => Some("lots".to_string()),
            "AT_RISK_TIER" => Some("extreme".to_string()),
            _ => None,
        });

        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalyticsConfig::default()
            .with_large_trade_threshold(1_000_000.0)
            .with_top_n(5)
            .with_at_risk_tier(RiskTier::Critical);

        assert_eq!(config.large_trade_threshold_usd, 1_000_000.0);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.at_risk_tier, RiskTier::Critical);
    }
}
