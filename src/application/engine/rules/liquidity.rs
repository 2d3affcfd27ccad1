//! Concentrated-LP management across the discovered pool set.
//!
//! Pool selection is multi-factor scored with a diversity rotation: a pool
//! picked within the rotation window carries a recency penalty so the
//! selector cycles through eligible candidates. Stale swarm intel collapses
//! the candidate set to the configured safe pair.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Urgency};
use crate::domain::ports::PoolCandidate;
use chrono::Duration;
use tracing::debug;

/// Score penalty for a pool picked within the rotation window.
const DIVERSITY_PENALTY: f64 = 0.25;

/// Pending fees worth a claim transaction.
const MIN_CLAIM_USD: f64 = 5.0;

fn pool_cooldown_key(pool: &PoolCandidate) -> String {
    format!("LP_POOL_{}", pool.address)
}

/// Multi-factor pool score: fee productivity (volume over TVL), headline
/// APR, and depth, with the stable flag as a small safety bonus.
pub fn base_score(pool: &PoolCandidate) -> f64 {
    let productivity = if pool.tvl_usd > 0.0 {
        (pool.volume_24h_usd / pool.tvl_usd).min(2.0)
    } else {
        0.0
    };
    let depth = (pool.tvl_usd / 1_000_000.0).min(1.0);
    let stable_bonus = if pool.stable { 0.1 } else { 0.0 };
    pool.apr.min(2.0) * 0.4 + productivity * 0.3 + depth * 0.2 + stable_bonus
}

/// Tie-break between same-pair candidates: tightest tick spacing for stable
/// pairs, highest fee rate for volatile ones.
fn prefer(a: &PoolCandidate, b: &PoolCandidate) -> std::cmp::Ordering {
    if a.pair == b.pair {
        if a.stable {
            // tighter spacing wins
            b.tick_spacing.cmp(&a.tick_spacing)
        } else {
            // higher fee rate wins
            a.fee_rate_bps.cmp(&b.fee_rate_bps)
        }
    } else {
        std::cmp::Ordering::Equal
    }
}

/// Select the best candidate after diversity rotation and the staleness
/// gate. Public for tests.
pub fn select_pool<'a>(ctx: &RuleContext, candidates: &'a [PoolCandidate]) -> Option<&'a PoolCandidate> {
    let intel_fresh = ctx
        .intel
        .freshness
        .values()
        .any(|at| ctx.now - *at < Duration::hours(ctx.config.intel_stale_hours));

    let eligible: Vec<&PoolCandidate> = if intel_fresh {
        candidates.iter().collect()
    } else {
        debug!(
            "liquidity: intel stale (> {}h), restricting to {}",
            ctx.config.intel_stale_hours, ctx.config.lp_safe_pair
        );
        candidates
            .iter()
            .filter(|p| p.pair == ctx.config.lp_safe_pair)
            .collect()
    };

    eligible
        .into_iter()
        .max_by(|a, b| {
            let score = |pool: &PoolCandidate| {
                let mut score = base_score(pool);
                if let Some(marked) = ctx.live_cooldowns.last_marked(&pool_cooldown_key(pool))
                    && ctx.now - marked < Duration::hours(ctx.config.diversity_rotation_hours)
                {
                    score -= DIVERSITY_PENALTY;
                }
                score
            };
            score(a)
                .partial_cmp(&score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| prefer(a, b))
        })
}

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();

    // Claim fees on positions that earned enough.
    for position in &ctx.portfolio.lp_positions {
        if position.pending_fees_usd >= MIN_CLAIM_USD {
            let urgency = Urgency::Low;
            decisions.push(Decision {
                kind: DecisionType::LpClaimFees,
                reasoning: format!(
                    "{} has ${:.2} unclaimed fees on {}",
                    position.pair, position.pending_fees_usd, position.venue
                ),
                params: serde_json::json!({
                    "venue": position.venue,
                    "position_id": position.position_id,
                }),
                urgency,
                estimated_impact_usd: position.pending_fees_usd,
                tier: ctx.classify(DecisionType::LpClaimFees, urgency, position.pending_fees_usd),
                intel_used: vec![],
            });
        }
    }

    // Rebalance out-of-range positions.
    for position in &ctx.portfolio.lp_positions {
        if position.in_range {
            continue;
        }
        let key = format!("{}_{}", DecisionType::LpRebalance, position.position_id);
        if !ctx.cooldown_ready(&key, ctx.config.close_cooldown_hours) {
            continue;
        }
        let urgency = Urgency::Medium;
        decisions.push(Decision {
            kind: DecisionType::LpRebalance,
            reasoning: format!(
                "{} out of range on {} (${:.0} idle)",
                position.pair, position.venue, position.value_usd
            ),
            params: serde_json::json!({
                "venue": position.venue,
                "position_id": position.position_id,
            }),
            urgency,
            estimated_impact_usd: position.value_usd,
            tier: ctx.classify(DecisionType::LpRebalance, urgency, position.value_usd),
            intel_used: vec![],
        });
    }

    // Open a new position from the discovered candidate set.
    if ctx.portfolio.usdc_balance >= ctx.config.lp_position_size_usd
        && !ctx.data.pool_candidates.is_empty()
        && ctx.cooldown_ready(
            &DecisionType::LpOpen.to_string(),
            ctx.config.lp_cooldown_hours,
        )
        && let Some(pool) = select_pool(ctx, &ctx.data.pool_candidates)
    {
        let size = ctx.config.lp_position_size_usd;
        let range_width = ctx.adapted(
            ctx.config.lp_base_range_width,
            ctx.adaptive.lp_range_multiplier,
        );
        let urgency = Urgency::Low;
        decisions.push(Decision {
            kind: DecisionType::LpOpen,
            reasoning: format!(
                "open {} on {} (apr {:.0}%, score {:.2})",
                pool.pair,
                pool.venue,
                pool.apr * 100.0,
                base_score(pool)
            ),
            params: serde_json::json!({
                "venue": pool.venue,
                "pool_address": pool.address,
                "pair": pool.pair,
                "size_usd": size,
                "range_width": range_width,
            }),
            urgency,
            estimated_impact_usd: size,
            tier: ctx.classify(DecisionType::LpOpen, urgency, size),
            intel_used: vec![],
        });
    }

    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::cooldowns::CooldownTracker;
    use crate::application::engine::rules::OpportunityData;
    use crate::config::EngineEnvConfig;
    use crate::domain::intel::SwarmIntel;
    use crate::domain::learning::AdaptiveParams;
    use crate::domain::portfolio::{LpPosition, PortfolioState};
    use chrono::Utc;

    fn pool(address: &str, pair: &str, apr: f64, stable: bool) -> PoolCandidate {
        PoolCandidate {
            venue: "orca".to_string(),
            chain: "solana".to_string(),
            address: address.to_string(),
            pair: pair.to_string(),
            tick_spacing: if stable { 1 } else { 64 },
            fee_rate_bps: if stable { 1 } else { 30 },
            tvl_usd: 2_000_000.0,
            volume_24h_usd: 1_000_000.0,
            apr,
            stable,
        }
    }

    struct Fixture {
        portfolio: PortfolioState,
        intel: SwarmIntel,
        adaptive: AdaptiveParams,
        config: EngineEnvConfig,
        data: OpportunityData,
        live: CooldownTracker,
        dry: CooldownTracker,
    }

    impl Fixture {
        fn new(pools: Vec<PoolCandidate>, positions: Vec<LpPosition>) -> Self {
            let mut intel = SwarmIntel::default();
            intel.mark_fresh("nova-analyst", Utc::now());
            intel.assess(Utc::now());
            let mut config = EngineEnvConfig::from_env().unwrap();
            // Live-mode gating so diversity marks matter in tests
            config.dry_run = false;
            Self {
                portfolio: PortfolioState {
                    usdc_balance: 1000.0,
                    lp_positions: positions,
                    ..Default::default()
                },
                intel,
                adaptive: AdaptiveParams::default(),
                config,
                data: OpportunityData {
                    pool_candidates: pools,
                    ..Default::default()
                },
                live: CooldownTracker::new(),
                dry: CooldownTracker::new(),
            }
        }

        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                portfolio: &self.portfolio,
                intel: &self.intel,
                adaptive: &self.adaptive,
                config: &self.config,
                data: &self.data,
                live_cooldowns: &self.live,
                dry_cooldowns: &self.dry,
                now: Utc::now(),
            }
        }
    }

    #[test]
    fn test_best_scored_pool_opens() {
        let fixture = Fixture::new(
            vec![
                pool("pool-a", "SOL/USDC", 0.20, false),
                pool("pool-b", "WIF/SOL", 0.80, false),
            ],
            vec![],
        );
        let decisions = evaluate(&fixture.ctx());
        let open = decisions
            .iter()
            .find(|d| d.kind == DecisionType::LpOpen)
            .expect("open decision");
        assert_eq!(open.params["pool_address"], "pool-b");
    }

    #[test]
    fn test_diversity_rotation_penalises_recent_pick() {
        let fixture = Fixture::new(
            vec![
                pool("pool-a", "SOL/USDC", 0.50, false),
                pool("pool-b", "WIF/SOL", 0.55, false),
            ],
            vec![],
        );
        // pool-b picked an hour ago: the 0.25 penalty outweighs its apr lead
        fixture.live.mark("LP_POOL_pool-b");
        let decisions = evaluate(&fixture.ctx());
        let open = decisions
            .iter()
            .find(|d| d.kind == DecisionType::LpOpen)
            .expect("open decision");
        assert_eq!(open.params["pool_address"], "pool-a");
    }

    #[test]
    fn test_stale_intel_falls_back_to_safe_pair() {
        let mut fixture = Fixture::new(
            vec![
                pool("pool-a", "SOL/USDC", 0.10, true),
                pool("pool-b", "WIF/SOL", 0.90, false),
            ],
            vec![],
        );
        fixture.intel.freshness.clear(); // nothing fresh
        let decisions = evaluate(&fixture.ctx());
        let open = decisions
            .iter()
            .find(|d| d.kind == DecisionType::LpOpen)
            .expect("open decision");
        assert_eq!(open.params["pair"], "SOL/USDC");
    }

    #[test]
    fn test_out_of_range_position_rebalances() {
        let fixture = Fixture::new(
            vec![],
            vec![LpPosition {
                venue: "orca".to_string(),
                chain: "solana".to_string(),
                position_id: "pos-1".to_string(),
                pair: "SOL/USDC".to_string(),
                value_usd: 400.0,
                in_range: false,
                pending_fees_usd: 1.0,
            }],
        );
        let decisions = evaluate(&fixture.ctx());
        assert!(decisions.iter().any(|d| d.kind == DecisionType::LpRebalance));
        // $1 of fees is under the claim floor
        assert!(decisions.iter().all(|d| d.kind != DecisionType::LpClaimFees));
    }

    #[test]
    fn test_earned_fees_claimed() {
        let fixture = Fixture::new(
            vec![],
            vec![LpPosition {
                venue: "meteora".to_string(),
                chain: "solana".to_string(),
                position_id: "pos-2".to_string(),
                pair: "SOL/USDC".to_string(),
                value_usd: 400.0,
                in_range: true,
                pending_fees_usd: 12.5,
            }],
        );
        let decisions = evaluate(&fixture.ctx());
        assert!(decisions.iter().any(|d| d.kind == DecisionType::LpClaimFees));
    }
}
