//! Swarm intelligence composite.
//!
//! Each decision cycle folds the freshest intel per category into a
//! `SwarmIntel` view and derives two scalars from it: a risk multiplier in
//! [0.5, 2.0] and a market condition bucket.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Market condition buckets derived from the risk composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    Bullish,
    Neutral,
    Bearish,
    Danger,
}

/// A guardian alert retained for the current cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianAlert {
    pub severity: String,
    pub description: String,
    pub category: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// An analyst price alert retained for the current cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub symbol: String,
    pub price_usd: f64,
    pub change_24h_pct: f64,
}

/// Enriched token row from guardian watchlists and analyst tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenIntel {
    pub symbol: String,
    pub mint: Option<String>,
    pub price_usd: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub trending: bool,
}

/// Composite swarm view computed once per decision cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmIntel {
    /// Freshness timestamp of the newest message seen per agent.
    pub freshness: HashMap<String, DateTime<Utc>>,

    pub scout_bullish: Option<bool>,
    pub scout_at: Option<DateTime<Utc>>,
    pub narratives: Vec<String>,

    pub guardian_alerts: Vec<GuardianAlert>,
    pub guardian_critical: bool,
    pub watchlist_tokens: Vec<TokenIntel>,

    pub analyst_tvl_usd: Option<f64>,
    pub analyst_volume_spike: bool,
    pub volume_spike_at: Option<DateTime<Utc>>,
    pub price_alerts: Vec<PriceAlert>,
    pub token_prices: HashMap<String, TokenIntel>,

    pub risk_multiplier: f64,
    pub market_condition: Option<MarketCondition>,
}

const SCOUT_FRESH_WINDOW_HOURS: i64 = 4;
const VOLUME_SPIKE_FRESH_WINDOW_HOURS: i64 = 2;

pub const RISK_MULTIPLIER_MIN: f64 = 0.5;
pub const RISK_MULTIPLIER_MAX: f64 = 2.0;

impl SwarmIntel {
    /// Derive the risk multiplier and market condition from the collected
    /// flags. Idempotent; call after the last category has been folded in.
    pub fn assess(&mut self, now: DateTime<Utc>) {
        let mut multiplier: f64 = 1.0;

        let scout_fresh = self
            .scout_at
            .map(|at| now - at < Duration::hours(SCOUT_FRESH_WINDOW_HOURS))
            .unwrap_or(false);

        if scout_fresh {
            match self.scout_bullish {
                Some(true) => multiplier -= 0.2,
                Some(false) => multiplier += 0.3,
                None => {}
            }
        }

        if self.guardian_critical {
            multiplier += 0.5;
        } else if !self.guardian_alerts.is_empty() {
            multiplier += 0.2;
        }

        let spike_fresh = self
            .volume_spike_at
            .map(|at| now - at < Duration::hours(VOLUME_SPIKE_FRESH_WINDOW_HOURS))
            .unwrap_or(false);
        if self.analyst_volume_spike && spike_fresh {
            multiplier += 0.15;
        }

        self.risk_multiplier = multiplier.clamp(RISK_MULTIPLIER_MIN, RISK_MULTIPLIER_MAX);

        self.market_condition = Some(if self.guardian_critical {
            MarketCondition::Danger
        } else if self.risk_multiplier >= 1.3 {
            MarketCondition::Bearish
        } else if self.risk_multiplier <= 0.7 {
            MarketCondition::Bullish
        } else {
            MarketCondition::Neutral
        });
    }

    pub fn condition(&self) -> MarketCondition {
        self.market_condition.unwrap_or(MarketCondition::Neutral)
    }

    pub fn mark_fresh(&mut self, agent: &str, at: DateTime<Utc>) {
        let entry = self.freshness.entry(agent.to_string()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }
}

/// Bullish/bearish lexicon applied to scout summaries when the payload
/// carries no explicit `crypto_bullish` flag.
const BULLISH_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "breakout", "accumulation", "momentum", "pump", "ath",
];
const BEARISH_WORDS: &[&str] = &[
    "bearish", "dump", "crash", "capitulation", "selloff", "liquidations", "fear", "rug",
];

/// Infer sentiment from a summary via keyword counts. Returns `None` when
/// neither side dominates.
pub fn infer_scout_sentiment(summary: &str) -> Option<bool> {
    let lower = summary.to_lowercase();
    let bullish = BULLISH_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let bearish = BEARISH_WORDS.iter().filter(|w| lower.contains(*w)).count();
    if bullish > bearish {
        Some(true)
    } else if bearish > bullish {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_intel(now: DateTime<Utc>) -> SwarmIntel {
        let mut intel = SwarmIntel::default();
        intel.scout_at = Some(now - Duration::minutes(30));
        intel
    }

    #[test]
    fn test_baseline_is_neutral() {
        let now = Utc::now();
        let mut intel = SwarmIntel::default();
        intel.assess(now);
        assert_eq!(intel.risk_multiplier, 1.0);
        assert_eq!(intel.condition(), MarketCondition::Neutral);
    }

    #[test]
    fn test_fresh_bullish_scout_lowers_risk() {
        let now = Utc::now();
        let mut intel = fresh_intel(now);
        intel.scout_bullish = Some(true);
        intel.assess(now);
        assert!((intel.risk_multiplier - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_stale_scout_ignored() {
        let now = Utc::now();
        let mut intel = SwarmIntel::default();
        intel.scout_bullish = Some(true);
        intel.scout_at = Some(now - Duration::hours(5));
        intel.assess(now);
        assert_eq!(intel.risk_multiplier, 1.0);
    }

    #[test]
    fn test_guardian_critical_dominates() {
        let now = Utc::now();
        let mut intel = SwarmIntel::default();
        intel.guardian_critical = true;
        intel.guardian_alerts.push(GuardianAlert {
            severity: "critical".to_string(),
            description: "LP drain detected".to_string(),
            category: None,
            received_at: now,
        });
        intel.assess(now);
        // +0.5 for critical, not +0.2 on top for the non-empty list
        assert!((intel.risk_multiplier - 1.5).abs() < 1e-9);
        assert_eq!(intel.condition(), MarketCondition::Danger);
    }

    #[test]
    fn test_clamp_bounds_hold_for_all_flag_combinations() {
        let now = Utc::now();
        for bullish in [None, Some(true), Some(false)] {
            for critical in [false, true] {
                for alerts in [false, true] {
                    for spike in [false, true] {
                        let mut intel = fresh_intel(now);
                        intel.scout_bullish = bullish;
                        intel.guardian_critical = critical;
                        if alerts {
                            intel.guardian_alerts.push(GuardianAlert {
                                severity: "high".to_string(),
                                description: "watch".to_string(),
                                category: None,
                                received_at: now,
                            });
                        }
                        intel.analyst_volume_spike = spike;
                        intel.volume_spike_at = spike.then(|| now - Duration::minutes(10));
                        intel.assess(now);
                        assert!(intel.risk_multiplier >= RISK_MULTIPLIER_MIN);
                        assert!(intel.risk_multiplier <= RISK_MULTIPLIER_MAX);
                    }
                }
            }
        }
    }

    #[test]
    fn test_bearish_condition_threshold() {
        let now = Utc::now();
        let mut intel = fresh_intel(now);
        intel.scout_bullish = Some(false);
        intel.guardian_alerts.push(GuardianAlert {
            severity: "high".to_string(),
            description: "drain risk".to_string(),
            category: None,
            received_at: now,
        });
        intel.assess(now);
        // 1.0 + 0.3 + 0.2 = 1.5 >= 1.3
        assert_eq!(intel.condition(), MarketCondition::Bearish);
    }

    #[test]
    fn test_sentiment_inference() {
        assert_eq!(
            infer_scout_sentiment("Solana rally continues, breakout confirmed"),
            Some(true)
        );
        assert_eq!(
            infer_scout_sentiment("Cascading liquidations and fear across the market"),
            Some(false)
        );
        assert_eq!(infer_scout_sentiment("TVL flat week over week"), None);
    }
}
