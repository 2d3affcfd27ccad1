//! Decision model and tier classification.
//!
//! Every rule block emits zero or more `Decision`s; the classifier assigns a
//! tier from urgency, estimated impact and the current market condition.

use crate::domain::intel::MarketCondition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision urgency, ordered critical < high < medium < low for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Critical => "critical",
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }
}

/// Approval tier: `Auto` executes silently, `Notify` executes then notifies,
/// `Approval` queues for the admin and does not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Auto,
    Notify,
    Approval,
}

impl Tier {
    /// One step up the gating ladder; `Approval` is the ceiling.
    pub fn bumped(self) -> Tier {
        match self {
            Tier::Auto => Tier::Notify,
            Tier::Notify | Tier::Approval => Tier::Approval,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Auto => "AUTO",
            Tier::Notify => "NOTIFY",
            Tier::Approval => "APPROVAL",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The catalogue of financial actions the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    CloseLosing,
    OpenHedge,
    CloseHedge,
    StakeIdle,
    EmergencyUnstake,
    PolymarketBet,
    PolymarketExit,
    LendingDeploy,
    LendingLpLoop,
    LstLoop,
    LpOpen,
    LpRebalance,
    LpClaimFees,
    FlashArb,
    RepayDebt,
    UnwindLoop,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::CloseLosing => "CLOSE_LOSING",
            DecisionType::OpenHedge => "OPEN_HEDGE",
            DecisionType::CloseHedge => "CLOSE_HEDGE",
            DecisionType::StakeIdle => "STAKE_IDLE",
            DecisionType::EmergencyUnstake => "EMERGENCY_UNSTAKE",
            DecisionType::PolymarketBet => "POLYMARKET_BET",
            DecisionType::PolymarketExit => "POLYMARKET_EXIT",
            DecisionType::LendingDeploy => "LENDING_DEPLOY",
            DecisionType::LendingLpLoop => "LENDING_LP_LOOP",
            DecisionType::LstLoop => "LST_LOOP",
            DecisionType::LpOpen => "LP_OPEN",
            DecisionType::LpRebalance => "LP_REBALANCE",
            DecisionType::LpClaimFees => "LP_CLAIM_FEES",
            DecisionType::FlashArb => "FLASH_ARB",
            DecisionType::RepayDebt => "REPAY_DEBT",
            DecisionType::UnwindLoop => "UNWIND_LOOP",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate financial action produced by one rule block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionType,
    pub reasoning: String,
    pub params: serde_json::Value,
    pub urgency: Urgency,
    pub estimated_impact_usd: f64,
    pub tier: Tier,
    pub intel_used: Vec<String>,
}

impl Decision {
    /// Cooldown key: decision kind, optionally scoped per asset
    /// (e.g. `OPEN_HEDGE_SOL`).
    pub fn cooldown_key(&self) -> String {
        match self.params.get("coin").and_then(|c| c.as_str()) {
            Some(coin) => format!("{}_{}", self.kind, coin),
            None => self.kind.to_string(),
        }
    }
}

/// Outcome of dispatching one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: Decision,
    pub executed: bool,
    pub success: bool,
    pub tx_id: Option<String>,
    pub error: Option<String>,
    pub dry_run: bool,
    pub pending_approval: bool,
    pub trace_id: String,
}

/// Tier thresholds, env-configured.
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub auto_tier_max_usd: f64,
    pub notify_tier_max_usd: f64,
    pub critical_bypass_approval: bool,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            auto_tier_max_usd: 50.0,
            notify_tier_max_usd: 200.0,
            critical_bypass_approval: true,
        }
    }
}

/// Classify a decision into its approval tier.
///
/// Critical urgency with the bypass enabled is always `Auto` — a stop-loss
/// must execute. Otherwise the tier follows |impact| against the auto and
/// notify ceilings. A `Danger` market bumps the result one tier up, except
/// for `CloseLosing`: a stop-loss still executes during a crash instead of
/// waiting on an admin.
pub fn classify_tier(
    kind: DecisionType,
    urgency: Urgency,
    impact_usd: f64,
    condition: MarketCondition,
    thresholds: &TierThresholds,
) -> Tier {
    if urgency == Urgency::Critical && thresholds.critical_bypass_approval {
        return Tier::Auto;
    }

    let impact = impact_usd.abs();

    let base = if impact < thresholds.auto_tier_max_usd {
        Tier::Auto
    } else if impact < thresholds.notify_tier_max_usd {
        Tier::Notify
    } else {
        Tier::Approval
    };

    // The danger bump gates new risk harder; closing a loser is risk-off
    // and keeps its tier.
    if condition == MarketCondition::Danger && kind != DecisionType::CloseLosing {
        base.bumped()
    } else {
        base
    }
}
