//! Decision-engine configuration parsing from environment variables.
//!
//! This module handles tier thresholds, hedge targets, per-strategy
//! cooldowns, stake reserves and strategy feature flags.

use anyhow::{Context, Result};
use std::env;

/// Decision engine environment configuration
#[derive(Debug, Clone)]
pub struct EngineEnvConfig {
    // Cycle
    pub auto_decisions: bool,
    pub decision_interval_min: u64,
    pub max_decisions_per_cycle: usize,
    pub dry_run: bool,

    // Tier gating
    pub auto_tier_usd: f64,
    pub notify_tier_usd: f64,
    pub approval_expiry_min: i64,
    pub critical_bypass_approval: bool,

    // Hedging
    pub hedge_target_ratio: f64,
    pub hedge_min_exposure_usd: f64,
    pub hedge_rebalance_threshold: f64,
    pub hedge_leverage: f64,
    pub hl_stop_loss_pct: f64,
    pub hl_liquidation_warning_pct: f64,

    // Staking
    pub stake_reserve_sol: f64,
    pub stake_min_amount_sol: f64,
    pub stake_position_cap_sol: f64,

    // Prediction markets
    pub poly_min_edge: f64,
    pub poly_kelly_fraction: f64,
    pub poly_max_bet_usd: f64,

    // Lending & loops
    pub min_lending_spread: f64,
    pub max_ltv: f64,
    pub min_health_factor: f64,
    pub min_loop_health_factor: f64,
    pub lending_deploy_fraction: f64,

    // Liquidity pools
    pub lp_position_size_usd: f64,
    pub lp_base_range_width: f64,
    pub diversity_rotation_hours: i64,
    pub intel_stale_hours: i64,
    pub lp_safe_pair: String,

    // Flash arbitrage
    pub min_flash_arb_profit_usd: f64,

    // Per-strategy cooldowns (hours)
    pub hedge_cooldown_hours: i64,
    pub stake_cooldown_hours: i64,
    pub close_cooldown_hours: i64,
    pub poly_cooldown_hours: i64,
    pub lend_cooldown_hours: i64,
    pub lp_cooldown_hours: i64,
    /// Shorter cooldown used for simulated decisions in dry-run mode.
    pub dry_run_cooldown_hours: i64,

    // Feature flags
    pub enable_hedging: bool,
    pub enable_staking: bool,
    pub enable_polymarket: bool,
    pub enable_lending: bool,
    pub enable_lp: bool,
    pub enable_flash_arb: bool,
}

impl EngineEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            auto_decisions: Self::parse_bool("AUTO_DECISIONS", true),
            decision_interval_min: Self::parse_u64("DECISION_INTERVAL_MIN", 30)?,
            max_decisions_per_cycle: Self::parse_usize("MAX_DECISIONS_PER_CYCLE", 3)?,
            dry_run: Self::parse_bool("DRY_RUN", true),

            auto_tier_usd: Self::parse_f64("AUTO_TIER_USD", 50.0)?,
            notify_tier_usd: Self::parse_f64("NOTIFY_TIER_USD", 200.0)?,
            approval_expiry_min: Self::parse_i64("APPROVAL_EXPIRY_MIN", 15)?,
            critical_bypass_approval: Self::parse_bool("CRITICAL_BYPASS_APPROVAL", true),

            hedge_target_ratio: Self::parse_f64("HEDGE_TARGET_RATIO", 0.50)?,
            hedge_min_exposure_usd: Self::parse_f64("HEDGE_MIN_EXPOSURE_USD", 50.0)?,
            hedge_rebalance_threshold: Self::parse_f64("HEDGE_REBALANCE_THRESHOLD", 0.15)?,
            hedge_leverage: Self::parse_f64("HEDGE_LEVERAGE", 2.0)?,
            hl_stop_loss_pct: Self::parse_f64("HL_STOP_LOSS_PCT", 25.0)?,
            hl_liquidation_warning_pct: Self::parse_f64("HL_LIQUIDATION_WARNING_PCT", 15.0)?,

            stake_reserve_sol: Self::parse_f64("STAKE_RESERVE", 2.0)?,
            stake_min_amount_sol: Self::parse_f64("STAKE_MIN_AMOUNT", 0.5)?,
            stake_position_cap_sol: Self::parse_f64("STAKE_POSITION_CAP", 100.0)?,

            poly_min_edge: Self::parse_f64("POLY_MIN_EDGE", 0.05)?,
            poly_kelly_fraction: Self::parse_f64("POLY_KELLY_FRACTION", 0.25)?,
            poly_max_bet_usd: Self::parse_f64("POLY_MAX_BET_USD", 100.0)?,

            min_lending_spread: Self::parse_f64("MIN_LENDING_SPREAD", 0.02)?,
            max_ltv: Self::parse_f64("MAX_LTV", 0.65)?,
            min_health_factor: Self::parse_f64("MIN_HEALTH_FACTOR", 1.6)?,
            min_loop_health_factor: Self::parse_f64("MIN_LOOP_HEALTH_FACTOR", 1.25)?,
            lending_deploy_fraction: Self::parse_f64("LENDING_DEPLOY_FRACTION", 0.5)?,

            lp_position_size_usd: Self::parse_f64("LP_POSITION_SIZE_USD", 250.0)?,
            lp_base_range_width: Self::parse_f64("LP_BASE_RANGE_WIDTH", 0.10)?,
            diversity_rotation_hours: Self::parse_i64("DIVERSITY_ROTATION_HOURS", 72)?,
            intel_stale_hours: Self::parse_i64("INTEL_STALE_HOURS", 6)?,
            lp_safe_pair: env::var("LP_SAFE_PAIR").unwrap_or_else(|_| "SOL/USDC".to_string()),

            min_flash_arb_profit_usd: Self::parse_f64("MIN_FLASH_ARB_PROFIT_USD", 5.0)?,

            hedge_cooldown_hours: Self::parse_i64("HEDGE_COOLDOWN_HOURS", 4)?,
            stake_cooldown_hours: Self::parse_i64("STAKE_COOLDOWN_HOURS", 6)?,
            close_cooldown_hours: Self::parse_i64("CLOSE_COOLDOWN_HOURS", 1)?,
            poly_cooldown_hours: Self::parse_i64("POLY_COOLDOWN_HOURS", 12)?,
            lend_cooldown_hours: Self::parse_i64("LEND_COOLDOWN_HOURS", 24)?,
            lp_cooldown_hours: Self::parse_i64("LP_COOLDOWN_HOURS", 12)?,
            dry_run_cooldown_hours: Self::parse_i64("DRY_RUN_COOLDOWN_HOURS", 2)?,

            enable_hedging: Self::parse_bool("ENABLE_HEDGING", true),
            enable_staking: Self::parse_bool("ENABLE_STAKING", true),
            enable_polymarket: Self::parse_bool("ENABLE_POLYMARKET", false),
            enable_lending: Self::parse_bool("ENABLE_LENDING", false),
            enable_lp: Self::parse_bool("ENABLE_LP", false),
            enable_flash_arb: Self::parse_bool("ENABLE_FLASH_ARB", false),
        })
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(default)
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<i64>()
            .context(format!("Failed to parse {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineEnvConfig::from_env().expect("Should parse with defaults");
        assert_eq!(config.decision_interval_min, 30);
        assert_eq!(config.max_decisions_per_cycle, 3);
        assert_eq!(config.auto_tier_usd, 50.0);
        assert_eq!(config.notify_tier_usd, 200.0);
        assert_eq!(config.approval_expiry_min, 15);
        assert!(config.critical_bypass_approval);
        assert_eq!(config.hedge_target_ratio, 0.50);
        assert_eq!(config.hedge_rebalance_threshold, 0.15);
        assert_eq!(config.hl_stop_loss_pct, 25.0);
        assert_eq!(config.hl_liquidation_warning_pct, 15.0);
        assert_eq!(config.hedge_cooldown_hours, 4);
        assert_eq!(config.dry_run_cooldown_hours, 2);
        assert_eq!(config.diversity_rotation_hours, 72);
    }
}
