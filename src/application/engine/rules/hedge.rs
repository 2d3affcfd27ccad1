//! Per-asset treasury hedging.
//!
//! Each hedgeable exposure gets an intel-adjusted target ratio
//! (`baseTarget * riskMultiplier`, clamped to 1.0). Drift beyond the
//! rebalance threshold opens or reduces the short, scaled down to available
//! margin and skipped entirely below $10.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Urgency};
use tracing::debug;

/// Hedge orders below this notional are not worth the fees.
const MIN_HEDGE_ORDER_USD: f64 = 10.0;

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();

    let target_base = ctx.adapted(
        ctx.config.hedge_target_ratio,
        ctx.adaptive.hedge_bias_multiplier,
    );
    let target = (target_base * ctx.intel.risk_multiplier).clamp(0.0, 1.0);

    for exposure in &ctx.portfolio.treasury_exposures {
        if !exposure.hl_listed || exposure.usd_value < ctx.config.hedge_min_exposure_usd {
            continue;
        }

        let short_usd = ctx.portfolio.perp.short_usd_for(&exposure.symbol);
        let current_ratio = if exposure.usd_value > 0.0 {
            short_usd / exposure.usd_value
        } else {
            0.0
        };
        let drift = target - current_ratio;

        if drift > ctx.config.hedge_rebalance_threshold {
            let key = format!("{}_{}", DecisionType::OpenHedge, exposure.symbol);
            if !ctx.cooldown_ready(&key, ctx.config.hedge_cooldown_hours) {
                debug!("hedge: open cooldown active for {}", exposure.symbol);
                continue;
            }

            let mut size_usd = drift * exposure.usd_value;
            // Scale down to what the margin account can carry.
            let max_notional =
                ctx.portfolio.perp.margin_available_usd * ctx.config.hedge_leverage;
            if size_usd > max_notional {
                debug!(
                    "hedge: {} order ${:.0} scaled to margin capacity ${:.0}",
                    exposure.symbol, size_usd, max_notional
                );
                size_usd = max_notional;
            }
            if size_usd < MIN_HEDGE_ORDER_USD {
                debug!("hedge: {} order below ${} floor", exposure.symbol, MIN_HEDGE_ORDER_USD);
                continue;
            }

            let urgency = if drift > 2.0 * ctx.config.hedge_rebalance_threshold {
                Urgency::High
            } else {
                Urgency::Medium
            };
            let tier = ctx.classify(DecisionType::OpenHedge, urgency, size_usd);

            decisions.push(Decision {
                kind: DecisionType::OpenHedge,
                reasoning: format!(
                    "{} hedge {:.0}% vs target {:.0}% (risk x{:.2})",
                    exposure.symbol,
                    current_ratio * 100.0,
                    target * 100.0,
                    ctx.intel.risk_multiplier
                ),
                params: serde_json::json!({
                    "coin": exposure.symbol,
                    "size_usd": size_usd,
                    "leverage": ctx.config.hedge_leverage,
                }),
                urgency,
                estimated_impact_usd: size_usd,
                tier,
                intel_used: vec![format!("risk_multiplier={:.2}", ctx.intel.risk_multiplier)],
            });
        } else if -drift > ctx.config.hedge_rebalance_threshold {
            let key = format!("{}_{}", DecisionType::CloseHedge, exposure.symbol);
            if !ctx.cooldown_ready(&key, ctx.config.hedge_cooldown_hours) {
                debug!("hedge: close cooldown active for {}", exposure.symbol);
                continue;
            }

            let size_usd = (-drift) * exposure.usd_value;
            if size_usd < MIN_HEDGE_ORDER_USD {
                continue;
            }
            let tier = ctx.classify(DecisionType::CloseHedge, Urgency::Medium, size_usd);

            decisions.push(Decision {
                kind: DecisionType::CloseHedge,
                reasoning: format!(
                    "{} over-hedged {:.0}% vs target {:.0}%, reducing",
                    exposure.symbol,
                    current_ratio * 100.0,
                    target * 100.0
                ),
                params: serde_json::json!({
                    "coin": exposure.symbol,
                    "size_usd": size_usd,
                    "reduce_only": true,
                }),
                urgency: Urgency::Medium,
                estimated_impact_usd: size_usd,
                tier,
                intel_used: vec![format!("risk_multiplier={:.2}", ctx.intel.risk_multiplier)],
            });
        }
    }

    decisions
}
