//! Collateral loops and the LTV/health unwind guard.
//!
//! Spread plays (borrow stable to deploy, LST leverage loops) are always
//! `Approval`-tiered: borrowed capital never moves without the admin.
//! Health checks use the looser loop threshold when an LST loop is active,
//! the stricter one for plain borrows.

use super::RuleContext;
use crate::domain::decision::{Decision, DecisionType, Tier, Urgency};
use tracing::debug;

/// Fraction of outstanding borrows repaid per unwind step.
const REPAY_STEP_FRACTION: f64 = 0.25;

pub fn evaluate(ctx: &RuleContext) -> Vec<Decision> {
    let mut decisions = Vec::new();

    let Some(account) = &ctx.portfolio.lending else {
        return decisions;
    };

    // Safety first: unwind checks run even when no APY data came back.
    let health_floor = if account.lst_loop_active {
        ctx.config.min_loop_health_factor
    } else {
        ctx.config.min_health_factor
    };

    if account.borrows_usd > 0.0 && account.health_factor < health_floor {
        let key = DecisionType::UnwindLoop.to_string();
        if ctx.cooldown_ready(&key, ctx.config.close_cooldown_hours) {
            let urgency = if account.health_factor < health_floor * 0.9 {
                Urgency::Critical
            } else {
                Urgency::High
            };
            let (kind, params, impact) = if account.lst_loop_active {
                (
                    DecisionType::UnwindLoop,
                    serde_json::json!({}),
                    account.borrows_usd,
                )
            } else {
                let repay = account.borrows_usd * REPAY_STEP_FRACTION;
                (
                    DecisionType::RepayDebt,
                    serde_json::json!({"asset": "USDC", "amount_usd": repay}),
                    repay,
                )
            };
            decisions.push(Decision {
                kind,
                reasoning: format!(
                    "health factor {:.2} under {:.2} floor ({} strategy)",
                    account.health_factor,
                    health_floor,
                    if account.lst_loop_active { "loop" } else { "borrow" }
                ),
                params,
                urgency,
                estimated_impact_usd: impact,
                tier: ctx.classify(kind, urgency, impact),
                intel_used: vec![],
            });
            return decisions;
        }
    }

    if account.borrows_usd > 0.0 && account.ltv > ctx.config.max_ltv {
        let key = DecisionType::RepayDebt.to_string();
        if ctx.cooldown_ready(&key, ctx.config.close_cooldown_hours) {
            let repay = account.borrows_usd * REPAY_STEP_FRACTION;
            let urgency = Urgency::High;
            decisions.push(Decision {
                kind: DecisionType::RepayDebt,
                reasoning: format!(
                    "LTV {:.0}% over the {:.0}% cap, repaying a step",
                    account.ltv * 100.0,
                    ctx.config.max_ltv * 100.0
                ),
                params: serde_json::json!({"asset": "USDC", "amount_usd": repay}),
                urgency,
                estimated_impact_usd: repay,
                tier: ctx.classify(DecisionType::RepayDebt, urgency, repay),
                intel_used: vec![],
            });
            return decisions;
        }
    }

    // Yield plays need live APYs and a healthy account.
    let Some(apys) = &ctx.data.lending_apys else {
        debug!("lending: no APY data this cycle");
        return decisions;
    };
    if account.health_factor > 0.0 && account.health_factor < ctx.config.min_health_factor {
        return decisions;
    }

    let borrow_sol = apys.borrow.get("SOL").copied().unwrap_or(f64::MAX);
    let borrow_usdc = apys.borrow.get("USDC").copied().unwrap_or(f64::MAX);

    // Best LST by loop spread: staking yield + deposit yield - SOL borrow.
    let best_lst = ctx
        .data
        .lst_assets
        .iter()
        .map(|lst| {
            let deposit = apys.deposit.get(&lst.symbol).copied().unwrap_or(0.0);
            (lst, lst.staking_apy + deposit - borrow_sol)
        })
        .filter(|(_, spread)| spread.is_finite())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((lst, spread)) = best_lst
        && spread >= ctx.config.min_lending_spread
    {
        let key = format!("{}_{}", DecisionType::LstLoop, lst.symbol);
        if ctx.cooldown_ready(&key, ctx.config.lend_cooldown_hours) {
            let amount_usd = ctx.portfolio.sol_balance
                * ctx.portfolio.sol_price_usd
                * ctx.config.lending_deploy_fraction;
            if amount_usd >= 10.0 {
                decisions.push(Decision {
                    kind: DecisionType::LstLoop,
                    reasoning: format!(
                        "{} loop spread {:.1}% (best of {} LSTs)",
                        lst.symbol,
                        spread * 100.0,
                        ctx.data.lst_assets.len()
                    ),
                    params: serde_json::json!({
                        "lst": lst.symbol,
                        "amount_usd": amount_usd,
                    }),
                    urgency: Urgency::Low,
                    estimated_impact_usd: amount_usd,
                    // Borrowed capital: admin signs off regardless of size.
                    tier: Tier::Approval,
                    intel_used: vec![],
                });
            }
        }
    }

    // Borrow-stable-and-deploy: best stable deposit vs USDC borrow cost.
    let best_deposit = apys
        .deposit
        .iter()
        .filter(|(asset, _)| asset.as_str() != "USDC")
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
    if let Some((asset, deposit_apy)) = best_deposit {
        let spread = deposit_apy - borrow_usdc;
        if spread >= ctx.config.min_lending_spread {
            let key = DecisionType::LendingDeploy.to_string();
            if ctx.cooldown_ready(&key, ctx.config.lend_cooldown_hours) {
                let amount_usd =
                    (account.deposits_usd * ctx.config.max_ltv - account.borrows_usd).max(0.0)
                        * ctx.config.lending_deploy_fraction;
                if amount_usd >= 10.0 {
                    decisions.push(Decision {
                        kind: DecisionType::LendingDeploy,
                        reasoning: format!(
                            "borrow USDC at {:.1}%, deploy into {} at {:.1}%",
                            borrow_usdc * 100.0,
                            asset,
                            deposit_apy * 100.0
                        ),
                        params: serde_json::json!({
                            "borrow_asset": "USDC",
                            "deploy_asset": asset,
                            "amount_usd": amount_usd,
                        }),
                        urgency: Urgency::Low,
                        estimated_impact_usd: amount_usd,
                        tier: Tier::Approval,
                        intel_used: vec![],
                    });
                }
            }
        } else {
            debug!(
                "lending: {} spread {:.2}% under the {:.2}% gate",
                asset,
                spread * 100.0,
                ctx.config.min_lending_spread * 100.0
            );
        }
    }

    decisions
}
