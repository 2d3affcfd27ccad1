//! The decision rule catalogue.
//!
//! Each block is a pure function over the cycle's gathered data: it sees the
//! portfolio snapshot, the swarm composite, the adaptive parameters and the
//! cooldown state, and emits zero or more candidate decisions. The engine
//! sorts the union by urgency and keeps the top N.

pub mod arbitrage;
pub mod hedge;
pub mod lending;
pub mod liquidity;
pub mod prediction;
pub mod staking;
pub mod stop_loss;

use super::cooldowns::CooldownTracker;
use crate::config::EngineEnvConfig;
use crate::domain::decision::{Decision, DecisionType, Tier, TierThresholds, Urgency, classify_tier};
use crate::domain::intel::SwarmIntel;
use crate::domain::learning::{AdaptiveParams, apply_adaptive};
use crate::domain::portfolio::PortfolioState;
use crate::domain::ports::{FlashArbOpportunity, LendingApys, LstAsset, PoolCandidate, PredictionOpportunity};
use chrono::{DateTime, Duration, Utc};


/// Opportunity data fetched from collaborators ahead of rule evaluation.
#[derive(Default)]
pub struct OpportunityData {
    pub prediction_opportunities: Vec<PredictionOpportunity>,
    pub lending_apys: Option<LendingApys>,
    pub lst_assets: Vec<LstAsset>,
    pub pool_candidates: Vec<PoolCandidate>,
    pub arb_opportunity: Option<FlashArbOpportunity>,
}

/// Everything one rule block sees.
pub struct RuleContext<'a> {
    pub portfolio: &'a PortfolioState,
    pub intel: &'a SwarmIntel,
    pub adaptive: &'a AdaptiveParams,
    pub config: &'a EngineEnvConfig,
    pub data: &'a OpportunityData,
    pub live_cooldowns: &'a CooldownTracker,
    pub dry_cooldowns: &'a CooldownTracker,
    pub now: DateTime<Utc>,
}

impl<'a> RuleContext<'a> {
    /// Cooldown gate for a candidate. Dry-run mode consults the short
    /// simulation cooldown; live mode honours the real strategy window.
    pub fn cooldown_ready(&self, key: &str, live_window_hours: i64) -> bool {
        if self.config.dry_run {
            self.dry_cooldowns.is_ready(
                key,
                Duration::hours(self.config.dry_run_cooldown_hours),
                self.now,
            )
        } else {
            self.live_cooldowns
                .is_ready(key, Duration::hours(live_window_hours), self.now)
        }
    }

    pub fn thresholds(&self) -> TierThresholds {
        TierThresholds {
            auto_tier_max_usd: self.config.auto_tier_usd,
            notify_tier_max_usd: self.config.notify_tier_usd,
            critical_bypass_approval: self.config.critical_bypass_approval,
        }
    }

    pub fn classify(&self, kind: DecisionType, urgency: Urgency, impact_usd: f64) -> Tier {
        classify_tier(
            kind,
            urgency,
            impact_usd,
            self.intel.condition(),
            &self.thresholds(),
        )
    }

    /// Apply a learned multiplier attenuated by confidence.
    pub fn adapted(&self, base: f64, multiplier: f64) -> f64 {
        apply_adaptive(base, multiplier, self.adaptive.confidence)
    }
}

/// Run every enabled rule block and keep the top candidates by urgency.
pub fn generate_decisions(ctx: &RuleContext) -> Vec<Decision> {
    let mut candidates = Vec::new();

    if ctx.config.enable_hedging {
        candidates.extend(stop_loss::evaluate(ctx));
        candidates.extend(hedge::evaluate(ctx));
    }
    if ctx.config.enable_staking {
        candidates.extend(staking::evaluate(ctx));
    }
    if ctx.config.enable_polymarket {
        candidates.extend(prediction::evaluate(ctx));
    }
    if ctx.config.enable_lending {
        candidates.extend(lending::evaluate(ctx));
    }
    if ctx.config.enable_lp {
        candidates.extend(liquidity::evaluate(ctx));
    }
    if ctx.config.enable_flash_arb {
        candidates.extend(arbitrage::evaluate(ctx));
    }

    // Urgency order is critical < high < medium < low; stable sort keeps
    // rule order within a band.
    candidates.sort_by_key(|d| d.urgency);
    candidates.truncate(ctx.config.max_decisions_per_cycle);
    candidates
}
