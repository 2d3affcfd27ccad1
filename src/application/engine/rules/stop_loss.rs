//! Stop-loss and liquidation guard over open perpetual positions.
//!
//! The loss threshold tightens as the swarm risk multiplier rises
//! (`stopLossPct / riskMultiplier`), and the learned stop-loss multiplier
//! shifts it further once enough trades back it. Liquidation proximity
//! overrides everything at critical urgency.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Urgency};
use tracing::debug;

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();

    let stop_loss_pct = ctx.adapted(
        ctx.config.hl_stop_loss_pct,
        ctx.adaptive.stop_loss_multiplier,
    );
    let adjusted_stop = stop_loss_pct / ctx.intel.risk_multiplier.max(f64::EPSILON);

    for position in &ctx.portfolio.perp.positions {
        if position.unrealized_pnl_usd >= 0.0 {
            continue;
        }

        let key = format!("{}_{}", DecisionType::CloseLosing, position.coin);
        if !ctx.cooldown_ready(&key, ctx.config.close_cooldown_hours) {
            debug!("stop-loss: cooldown active for {}", position.coin);
            continue;
        }

        let near_liquidation = position
            .liquidation_distance_pct()
            .map(|d| d < ctx.config.hl_liquidation_warning_pct)
            .unwrap_or(false);
        let loss_pct = position.loss_pct_of_margin();

        let (urgency, reasoning) = if near_liquidation {
            (
                Urgency::Critical,
                format!(
                    "{} within {:.1}% of liquidation (warning at {:.0}%)",
                    position.coin,
                    position.liquidation_distance_pct().unwrap_or(0.0),
                    ctx.config.hl_liquidation_warning_pct
                ),
            )
        } else if loss_pct > adjusted_stop {
            (
                Urgency::High,
                format!(
                    "{} down {:.1}% of margin (stop at {:.1}%, risk x{:.2})",
                    position.coin, loss_pct, adjusted_stop, ctx.intel.risk_multiplier
                ),
            )
        } else {
            continue;
        };

        let impact = position.unrealized_pnl_usd.abs();
        let tier = ctx.classify(DecisionType::CloseLosing, urgency, impact);

        decisions.push(Decision {
            kind: DecisionType::CloseLosing,
            reasoning,
            params: serde_json::json!({
                "coin": position.coin,
                "size": position.size.abs(),
                "is_buy": position.is_short(),
            }),
            urgency,
            estimated_impact_usd: impact,
            tier,
            intel_used: vec![format!("risk_multiplier={:.2}", ctx.intel.risk_multiplier)],
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
    use crate::domain::decision::Tier;
    use crate::domain::intel::SwarmIntel;
    use crate::domain::learning::AdaptiveParams;
    use crate::domain::portfolio::{PerpAccountSummary, PerpPosition, PortfolioState};
    use chrono::Utc;

    fn context_fixture() -> (EngineEnvConfig, SwarmIntel, AdaptiveParams, OpportunityData, CooldownTracker, CooldownTracker) {
        let config = EngineEnvConfig::from_env().unwrap();
        let mut intel = SwarmIntel::default();
        intel.assess(Utc::now());
        (
            config,
            intel,
            AdaptiveParams::default(),
            OpportunityData::default(),
            CooldownTracker::new(),
            CooldownTracker::new(),
        )
    }

    fn short_position(pnl: f64, margin: f64, mark: f64, liq: Option<f64>) -> PortfolioState {
        PortfolioState {
            perp: PerpAccountSummary {
                margin_available_usd: 500.0,
                account_value_usd: 500.0,
                positions: vec![PerpPosition {
                    coin: "SOL".to_string(),
                    size: -1.0,
                    entry_price: mark,
                    mark_price: mark,
                    liquidation_price: liq,
                    margin_used_usd: margin,
                    unrealized_pnl_usd: pnl,
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_forty_pct_loss_closes_at_auto_tier() {
        // -$40 on $100 margin: 40% > 25% stop, |impact| $40 under the $50
        // auto ceiling
        let portfolio = short_position(-40.0, 100.0, 100.0, None);
        let (config, intel, adaptive, data, live, dry) = context_fixture();
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

        let decisions = evaluate(&ctx);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionType::CloseLosing);
        assert_eq!(decisions[0].urgency, Urgency::High);
        assert_eq!(decisions[0].tier, Tier::Auto);
        assert_eq!(decisions[0].params["is_buy"], true);
    }

    #[test]
    fn test_liquidation_proximity_is_critical() {
        // Short at mark 100, liquidation 108: 8% < 15% warning distance
        let portfolio = short_position(-50.0, 100.0, 100.0, Some(108.0));
        let (config, intel, adaptive, data, live, dry) = context_fixture();
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

        let decisions = evaluate(&ctx);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].urgency, Urgency::Critical);
        assert_eq!(decisions[0].tier, Tier::Auto);
    }

    #[test]
    fn test_small_loss_is_left_alone() {
        // 10% of margin, stop at 25%
        let portfolio = short_position(-10.0, 100.0, 100.0, None);
        let (config, intel, adaptive, data, live, dry) = context_fixture();
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
        assert!(evaluate(&ctx).is_empty());
    }

    #[test]
    fn test_bearish_intel_tightens_the_stop() {
        // 18% loss, stop 25 / 1.5 = 16.7% so the bearish view closes it
        let portfolio = short_position(-18.0, 100.0, 100.0, None);
        let (config, mut intel, adaptive, data, live, dry) = context_fixture();
        intel.risk_multiplier = 1.5;
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
        assert_eq!(evaluate(&ctx).len(), 1);
    }
}
