//! Configuration module for Nova.
//!
//! This module provides structured configuration loading from environment
//! variables, organized by domain: Swarm runtime, Decision engine, and
//! Observability.

mod engine_env_config;
mod observability_config;
mod swarm_env_config;

pub use engine_env_config::EngineEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use swarm_env_config::SwarmEnvConfig;

use crate::domain::decision::TierThresholds;
use anyhow::{Context, Result};
use std::env;

/// Main application configuration.
///
/// Aggregates the sub-configs and carries the handful of core settings that
/// do not belong to a single domain.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Global execution switch; when false the whole system runs dry.
    pub live_trading: bool,
    pub admin_chat_id: Option<i64>,

    pub swarm: SwarmEnvConfig,
    pub engine: EngineEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://nova.db".to_string());

        let live_trading = env::var("LIVE_TRADING")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        let admin_chat_id = env::var("ADMIN_CHAT_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok());

        Ok(Self {
            database_url,
            live_trading,
            admin_chat_id,
            swarm: SwarmEnvConfig::from_env().context("Failed to load swarm config")?,
            engine: EngineEnvConfig::from_env().context("Failed to load engine config")?,
            observability: ObservabilityEnvConfig::from_env(),
        })
    }

    /// Tier thresholds for the decision classifier.
    pub fn tier_thresholds(&self) -> TierThresholds {
        TierThresholds {
            auto_tier_max_usd: self.engine.auto_tier_usd,
            notify_tier_max_usd: self.engine.notify_tier_usd,
            critical_bypass_approval: self.engine.critical_bypass_approval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_defaults() {
        let config = Config::from_env().expect("Should parse with defaults");
        assert_eq!(config.swarm.poll_interval_ms, 5000);
        assert_eq!(config.engine.max_decisions_per_cycle, 3);
        assert!(!config.live_trading);
    }

    #[test]
    fn test_tier_thresholds_from_engine_config() {
        let config = Config::from_env().unwrap();
        let thresholds = config.tier_thresholds();
        assert_eq!(thresholds.auto_tier_max_usd, 50.0);
        assert_eq!(thresholds.notify_tier_max_usd, 200.0);
    }
}
