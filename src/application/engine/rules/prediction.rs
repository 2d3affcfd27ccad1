//! Kelly-sized prediction-market bets.
//!
//! Opportunities come pre-scanned from the venue; the rule adjusts each
//! edge with swarm intel (trending symbols the scout and analyst surfaced),
//! applies the learned Kelly multiplier, and skips anything under the
//! learned minimum edge. Danger markets place no bets at all.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Urgency};
use crate::domain::intel::MarketCondition;
use tracing::debug;

/// Edge bonus when the question aligns with a trending swarm symbol.
const INTEL_EDGE_BONUS: f64 = 0.02;

/// Bets below this size are not worth placing.
const MIN_BET_USD: f64 = 5.0;

fn intel_edge_modifier(ctx: &RuleContext, question: &str) -> f64 {
    let lower = question.to_lowercase();
    let trending = ctx
        .intel
        .token_prices
        .values()
        .filter(|t| t.trending)
        .chain(ctx.intel.watchlist_tokens.iter().filter(|t| t.trending));
    for token in trending {
        if lower.contains(&token.symbol.to_lowercase()) {
            return INTEL_EDGE_BONUS;
        }
    }
    0.0
}

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();

    if ctx.intel.condition() == MarketCondition::Danger {
        debug!("prediction: danger market, no bets");
        return decisions;
    }

    let min_edge = ctx
        .adaptive
        .min_edge_override
        .unwrap_or(ctx.config.poly_min_edge);
    let kelly_fraction = ctx.adapted(
        ctx.config.poly_kelly_fraction,
        ctx.adaptive.kelly_multiplier,
    );
    let headroom = ctx.portfolio.usdc_balance;

    for opportunity in &ctx.data.prediction_opportunities {
        let adjusted_edge =
            opportunity.edge() + intel_edge_modifier(ctx, &opportunity.question);
        if adjusted_edge < min_edge {
            debug!(
                "prediction: '{}' edge {:.3} under minimum {:.3}",
                opportunity.question, adjusted_edge, min_edge
            );
            continue;
        }

        let key = format!("{}_{}", DecisionType::PolymarketBet, opportunity.market_id);
        if !ctx.cooldown_ready(&key, ctx.config.poly_cooldown_hours) {
            continue;
        }

        // Fractional Kelly over the implied odds.
        let implied = opportunity.implied_prob.clamp(0.01, 0.99);
        let full_kelly = adjusted_edge / (1.0 - implied);
        let size_usd = (headroom * kelly_fraction * full_kelly)
            .min(ctx.config.poly_max_bet_usd)
            .min(opportunity.max_size_usd);
        if size_usd < MIN_BET_USD {
            continue;
        }

        let urgency = Urgency::Medium;
        decisions.push(Decision {
            kind: DecisionType::PolymarketBet,
            reasoning: format!(
                "'{}' edge {:.1}% (kelly {:.2})",
                opportunity.question,
                adjusted_edge * 100.0,
                full_kelly
            ),
            params: serde_json::json!({
                "market_id": opportunity.market_id,
                "token_id": opportunity.token_id,
                "size_usd": size_usd,
            }),
            urgency,
            estimated_impact_usd: size_usd,
            tier: ctx.classify(DecisionType::PolymarketBet, urgency, size_usd),
            intel_used: if intel_edge_modifier(ctx, &opportunity.question) > 0.0 {
                vec!["trending_alignment".to_string()]
            } else {
                vec![]
            },
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
    use crate::domain::intel::{SwarmIntel, TokenIntel};
    use crate::domain::learning::AdaptiveParams;
    use crate::domain::portfolio::PortfolioState;
    use crate::domain::ports::PredictionOpportunity;
    use chrono::Utc;

    fn opportunity(question: &str, implied: f64, model: f64) -> PredictionOpportunity {
        PredictionOpportunity {
            market_id: "mkt-1".to_string(),
            token_id: "tok-yes".to_string(),
            question: question.to_string(),
            implied_prob: implied,
            model_prob: model,
            max_size_usd: 500.0,
        }
    }

    fn run(
        opportunities: Vec<PredictionOpportunity>,
        intel: SwarmIntel,
        adaptive: AdaptiveParams,
    ) -> Vec<Decision> {
        let portfolio = PortfolioState {
            usdc_balance: 1000.0,
            ..Default::default()
        };
        let config = EngineEnvConfig::from_env().unwrap();
        let data = OpportunityData {
            prediction_opportunities: opportunities,
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

    fn neutral_intel() -> SwarmIntel {
        let mut intel = SwarmIntel::default();
        intel.assess(Utc::now());
        intel
    }

    #[test]
    fn test_edge_above_minimum_places_bet() {
        let decisions = run(
            vec![opportunity("Will SOL close above $200?", 0.40, 0.55)],
            neutral_intel(),
            AdaptiveParams::default(),
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, DecisionType::PolymarketBet);
        let size = decisions[0].params["size_usd"].as_f64().unwrap();
        assert!(size > 0.0 && size <= 100.0);
    }

    #[test]
    fn test_thin_edge_skipped() {
        let decisions = run(
            vec![opportunity("Will it rain?", 0.50, 0.53)],
            neutral_intel(),
            AdaptiveParams::default(),
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_trending_symbol_lifts_borderline_edge() {
        let mut intel = neutral_intel();
        intel.token_prices.insert(
            "WIF".to_string(),
            TokenIntel {
                symbol: "WIF".to_string(),
                mint: None,
                price_usd: Some(2.0),
                change_24h_pct: Some(25.0),
                trending: true,
            },
        );
        // Raw edge 0.04 under the 0.05 floor; +0.02 alignment clears it
        let decisions = run(
            vec![opportunity("Will WIF flip BONK this month?", 0.50, 0.54)],
            intel,
            AdaptiveParams::default(),
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].intel_used, vec!["trending_alignment"]);
    }

    #[test]
    fn test_danger_market_places_nothing() {
        let mut intel = SwarmIntel::default();
        intel.guardian_critical = true;
        intel.assess(Utc::now());
        let decisions = run(
            vec![opportunity("Will SOL close above $200?", 0.40, 0.60)],
            intel,
            AdaptiveParams::default(),
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_learned_min_edge_override() {
        let adaptive = AdaptiveParams {
            min_edge_override: Some(0.20),
            ..Default::default()
        };
        let decisions = run(
            vec![opportunity("Will SOL close above $200?", 0.40, 0.55)],
            neutral_intel(),
            adaptive,
        );
        // 0.15 edge fails the learned 0.20 floor
        assert!(decisions.is_empty());
    }
}
