//! Idle-capital staking and the emergency unstake valve.
//!
//! Idle SOL above the reserve gets 80% staked, bounded by the position cap.
//! Liquid balance under half the reserve pulls from the staked pool.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Urgency};
use tracing::debug;

/// Share of idle balance above the reserve that gets staked.
const STAKE_FRACTION: f64 = 0.8;

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();
    let config = ctx.config;
    let idle = ctx.portfolio.sol_balance;
    let staked = ctx.portfolio.stake.staked_sol;
    let sol_price = ctx.portfolio.sol_price_usd;

    // Emergency unstake first: it wins over any staking idea this cycle.
    if idle < config.stake_reserve_sol / 2.0 && staked > 0.0 {
        let key = DecisionType::EmergencyUnstake.to_string();
        if ctx.cooldown_ready(&key, config.close_cooldown_hours) {
            let amount = (config.stake_reserve_sol - idle).min(staked);
            let impact = amount * sol_price;
            let urgency = Urgency::High;
            return vec![Decision {
                kind: DecisionType::EmergencyUnstake,
                reasoning: format!(
                    "liquid {:.2} SOL under half reserve ({:.2}), pulling {:.2} SOL",
                    idle, config.stake_reserve_sol, amount
                ),
                params: serde_json::json!({"amount_sol": amount}),
                urgency,
                estimated_impact_usd: impact,
                tier: ctx.classify(DecisionType::EmergencyUnstake, urgency, impact),
                intel_used: vec![],
            }];
        }
        return decisions;
    }

    if idle > config.stake_reserve_sol {
        let key = DecisionType::StakeIdle.to_string();
        if !ctx.cooldown_ready(&key, config.stake_cooldown_hours) {
            debug!("staking: cooldown active");
            return decisions;
        }

        let mut amount = (idle - config.stake_reserve_sol) * STAKE_FRACTION;
        let headroom = (config.stake_position_cap_sol - staked).max(0.0);
        if amount > headroom {
            debug!(
                "staking: {:.2} SOL capped to position headroom {:.2}",
                amount, headroom
            );
            amount = headroom;
        }
        if amount < config.stake_min_amount_sol {
            debug!("staking: {:.2} SOL under minimum, skipping", amount);
            return decisions;
        }

        let impact = amount * sol_price;
        let urgency = Urgency::Low;
        decisions.push(Decision {
            kind: DecisionType::StakeIdle,
            reasoning: format!(
                "{:.2} SOL idle above the {:.2} reserve, staking {:.2}",
                idle, config.stake_reserve_sol, amount
            ),
            params: serde_json::json!({"amount_sol": amount}),
            urgency,
            estimated_impact_usd: impact,
            tier: ctx.classify(DecisionType::StakeIdle, urgency, impact),
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
    use crate::domain::portfolio::{PortfolioState, StakePosition};
    use chrono::Utc;

    fn run(idle_sol: f64, staked_sol: f64) -> Vec<Decision> {
        let portfolio = PortfolioState {
            sol_balance: idle_sol,
            sol_price_usd: 100.0,
            stake: StakePosition {
                staked_sol,
                value_usd: staked_sol * 100.0,
            },
            ..Default::default()
        };
        let config = EngineEnvConfig::from_env().unwrap();
        let mut intel = SwarmIntel::default();
        intel.assess(Utc::now());
        let adaptive = AdaptiveParams::default();
        let data = OpportunityData::default();
        let live = CooldownTracker::new();
        let dry = CooldownTracker::new();
        let ctx = RuleContext {
            portfolio: &portfolio,
            intel: &intel,
            adaptive: &adaptive,
            config: &config,
            data: &data,
            live_cooldowns: &live,
            dry_cooldowns: &dry,
            now: Utc::now(),
        };
        evaluate(&ctx)
    }

    #[test]
    fn test_idle_above_reserve_stakes_80_pct() {
        // reserve 2.0: idle 12 -> stake (12-2)*0.8 = 8
        let decisions = run(12.0, 0.0);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionType::StakeIdle);
        let amount = decisions[0].params["amount_sol"].as_f64().unwrap();
        assert!((amount - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_idle_under_reserve_does_nothing() {
        assert!(run(1.5, 10.0).is_empty());
    }

    #[test]
    fn test_emergency_unstake_below_half_reserve() {
        // idle 0.5 < 1.0 (half of 2.0): pull back up to the reserve
        let decisions = run(0.5, 20.0);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionType::EmergencyUnstake);
        assert_eq!(decisions[0].urgency, Urgency::High);
        let amount = decisions[0].params["amount_sol"].as_f64().unwrap();
        assert!((amount - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_stake_capped_by_position_limit() {
        // cap 100, already 99 staked: headroom 1.0 is above the 0.5 minimum
        let decisions = run(12.0, 99.0);
        assert_eq!(decisions.len(), 1);
        let amount = decisions[0].params["amount_sol"].as_f64().unwrap();
        assert!((amount - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_emergency_without_stake() {
        assert!(run(0.1, 0.0).is_empty());
    }
}
