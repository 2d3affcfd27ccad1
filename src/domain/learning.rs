//! Adaptive parameters produced by the learning retrospective.
//!
//! The engine never applies a raw multiplier: the effect is scaled by a
//! confidence factor derived from sample size, so an empty history leaves
//! every base parameter untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed trades required per strategy before a multiplier may deviate
/// from 1.0.
pub const MIN_SAMPLES_FOR_DEVIATION: usize = 5;

/// Samples at which confidence saturates.
pub const CONFIDENCE_SATURATION_SAMPLES: usize = 50;

/// EMA weight of the freshly derived multipliers.
pub const EMA_ALPHA: f64 = 0.3;

/// Strategy buckets tracked by the retrospective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Hedge,
    Staking,
    Polymarket,
    Lending,
    LstLoop,
    LiquidityPool,
    FlashArb,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Hedge => "hedge",
            StrategyKind::Staking => "staking",
            StrategyKind::Polymarket => "polymarket",
            StrategyKind::Lending => "lending",
            StrategyKind::LstLoop => "lst_loop",
            StrategyKind::LiquidityPool => "liquidity_pool",
            StrategyKind::FlashArb => "flash_arb",
        }
    }
}

/// One closed position row from the position ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub strategy: StrategyKind,
    pub pnl_usd: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    /// LP positions: chain and pair for the per-chain/per-pair ranking.
    pub chain: Option<String>,
    pub pair: Option<String>,
    /// LP positions: closed while out of range.
    pub out_of_range: Option<bool>,
    /// LP positions: rebalances performed over the position lifetime.
    pub rebalances: Option<u32>,
    /// Prediction bets: entry probability and resolved outcome.
    pub predicted_prob: Option<f64>,
    pub won: Option<bool>,
}

impl ClosedPosition {
    pub fn hold_hours(&self) -> f64 {
        (self.closed_at - self.opened_at).num_minutes() as f64 / 60.0
    }
}

/// Per-strategy performance digest over the retrospective window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyStats {
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_pnl_usd: f64,
    pub sharpe_approx: f64,
    pub max_drawdown_usd: f64,
    /// Win rate over the last 10 closed trades.
    pub recent_win_rate: f64,
    pub avg_hold_hours: f64,
}

/// LP-specific retrospective output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LpStats {
    pub out_of_range_rate: f64,
    pub rebalance_count: u32,
    /// (chain, pnl-per-day) ranked best first.
    pub pnl_per_day_by_chain: Vec<(String, f64)>,
    /// (pair, pnl-per-day) ranked best first.
    pub pnl_per_day_by_pair: Vec<(String, f64)>,
}

/// Prediction-market calibration digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionCalibration {
    pub brier_score: f64,
    pub overconfidence_rate: f64,
    /// Mean predicted probability minus realised win rate.
    pub calibration_gap: f64,
}

/// The adaptive parameter blob persisted between cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveParams {
    /// min(1, total samples / 50).
    pub confidence: f64,
    pub kelly_multiplier: f64,
    pub stop_loss_multiplier: f64,
    pub lp_range_multiplier: f64,
    pub hedge_bias_multiplier: f64,
    /// Absolute override for the prediction-market minimum edge.
    pub min_edge_override: Option<f64>,
    pub strategy_scores: HashMap<String, f64>,
    pub strategy_samples: HashMap<String, usize>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            kelly_multiplier: 1.0,
            stop_loss_multiplier: 1.0,
            lp_range_multiplier: 1.0,
            hedge_bias_multiplier: 1.0,
            min_edge_override: None,
            strategy_scores: HashMap::new(),
            strategy_samples: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

impl AdaptiveParams {
    pub fn total_samples(&self) -> usize {
        self.strategy_samples.values().sum()
    }

    /// Blend freshly derived params into the prior:
    /// `blended = alpha * new + (1 - alpha) * prior` per multiplier.
    pub fn ema_blend(prior: &AdaptiveParams, fresh: &AdaptiveParams, alpha: f64) -> AdaptiveParams {
        let blend = |old: f64, new: f64| alpha * new + (1.0 - alpha) * old;
        let mut scores = prior.strategy_scores.clone();
        for (key, value) in &fresh.strategy_scores {
            let entry = scores.entry(key.clone()).or_insert(*value);
            *entry = blend(*entry, *value);
        }
        AdaptiveParams {
            confidence: fresh.confidence,
            kelly_multiplier: blend(prior.kelly_multiplier, fresh.kelly_multiplier),
            stop_loss_multiplier: blend(prior.stop_loss_multiplier, fresh.stop_loss_multiplier),
            lp_range_multiplier: blend(prior.lp_range_multiplier, fresh.lp_range_multiplier),
            hedge_bias_multiplier: blend(prior.hedge_bias_multiplier, fresh.hedge_bias_multiplier),
            min_edge_override: fresh.min_edge_override.or(prior.min_edge_override),
            strategy_scores: scores,
            strategy_samples: fresh.strategy_samples.clone(),
            updated_at: fresh.updated_at,
        }
    }
}

/// Scale a base parameter by a learned multiplier, attenuated by confidence:
/// `effective = base * (1 + (mult - 1) * confidence)`. No data means no
/// change.
pub fn apply_adaptive(base: f64, multiplier: f64, confidence: f64) -> f64 {
    base * (1.0 + (multiplier - 1.0) * confidence.clamp(0.0, 1.0))
}

pub fn confidence_for_samples(samples: usize) -> f64 {
    (samples as f64 / CONFIDENCE_SATURATION_SAMPLES as f64).min(1.0)
}
