//! Flash arbitrage via the bridge collaborator.
//!
//! The collaborator returns at most one opportunity with profit already net
//! of costs; the rule only checks the profit floor. An atomic arb carries no
//! inventory risk, so it executes at `Auto` when it clears the minimum.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Tier, Urgency};
use tracing::debug;

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let Some(opportunity) = &ctx.data.arb_opportunity else {
        return Vec::new();
    };

    if opportunity.net_profit_usd < ctx.config.min_flash_arb_profit_usd {
        debug!(
            "arbitrage: {} nets ${:.2}, under the ${:.2} floor",
            opportunity.route, opportunity.net_profit_usd, ctx.config.min_flash_arb_profit_usd
        );
        return Vec::new();
    }

    let key = DecisionType::FlashArb.to_string();
    if !ctx.cooldown_ready(&key, ctx.config.close_cooldown_hours) {
        return Vec::new();
    }

    vec![Decision {
        kind: DecisionType::FlashArb,
        reasoning: format!(
            "{} nets ${:.2} on ${:.0}",
            opportunity.route, opportunity.net_profit_usd, opportunity.size_usd
        ),
        params: serde_json::json!({
            "route": opportunity.route,
            "size_usd": opportunity.size_usd,
            "net_profit_usd": opportunity.net_profit_usd,
        }),
        urgency: Urgency::High,
        estimated_impact_usd: opportunity.net_profit_usd,
        tier: Tier::Auto,
        intel_used: vec![],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::cooldowns::CooldownTracker;
    use crate::application::engine::rules::OpportunityData;
    use crate::config::EngineEnvConfig;
    use crate::domain::intel::SwarmIntel;
    use crate::domain::learning::AdaptiveParams;
    use crate::domain::portfolio::PortfolioState;
    use crate::domain::ports::FlashArbOpportunity;
    use chrono::Utc;

    fn run(opportunity: Option<FlashArbOpportunity>) -> Vec<Decision> {
        let portfolio = PortfolioState::default();
        let config = EngineEnvConfig::from_env().unwrap();
        let mut intel = SwarmIntel::default();
        intel.assess(Utc::now());
        let adaptive = AdaptiveParams::default();
        let data = OpportunityData {
            arb_opportunity: opportunity,
            ..Default::default()
        };
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
    fn test_profitable_arb_is_auto() {
        let decisions = run(Some(FlashArbOpportunity {
            route: "SOL: orca -> base: aerodrome".to_string(),
            size_usd: 2000.0,
            net_profit_usd: 12.0,
        }));
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].tier, Tier::Auto);
    }

    #[test]
    fn test_unprofitable_arb_skipped() {
        let decisions = run(Some(FlashArbOpportunity {
            route: "dust route".to_string(),
            size_usd: 100.0,
            net_profit_usd: 1.0,
        }));
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_no_opportunity_no_decision() {
        assert!(run(None).is_empty());
    }
}
