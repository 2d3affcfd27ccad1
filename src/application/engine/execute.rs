//! Per-decision execution dispatcher.
//!
//! `Approval`-tier decisions never execute here; they come back flagged for
//! the queue. Dry-run mode logs the planned action and marks the short
//! simulation cooldown without touching any collaborator. Live successes
//! mark the real strategy cooldown.

use super::EngineServices;
use super::cooldowns::CooldownTracker;
use crate::config::EngineEnvConfig;
use crate::domain::decision::{Decision, DecisionResult, DecisionType, Tier};
use crate::domain::errors::ExecutionError;
use crate::domain::ports::{FlashArbOpportunity, HedgeRequest, LpVenue, OpenLpRequest, TxReceipt};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

fn result_base(decision: &Decision, trace_id: &str) -> DecisionResult {
    DecisionResult {
        decision: decision.clone(),
        executed: false,
        success: true,
        tx_id: None,
        error: None,
        dry_run: false,
        pending_approval: false,
        trace_id: trace_id.to_string(),
    }
}

fn param_str(decision: &Decision, key: &str) -> Result<String, ExecutionError> {
    decision
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ExecutionError::Failed {
            decision_type: decision.kind.to_string(),
            reason: format!("missing param '{}'", key),
        })
}

fn param_f64(decision: &Decision, key: &str) -> Result<f64, ExecutionError> {
    decision
        .params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ExecutionError::Failed {
            decision_type: decision.kind.to_string(),
            reason: format!("missing param '{}'", key),
        })
}

fn resolve_lp_venue<'a>(
    services: &'a EngineServices,
    name: &str,
) -> Result<&'a Arc<dyn LpVenue>, ExecutionError> {
    services
        .lp_venues
        .iter()
        .find(|v| v.venue_name() == name)
        .ok_or_else(|| ExecutionError::NoCollaborator {
            decision_type: format!("LP venue '{}'", name),
        })
}

/// Execute one decision against the wired collaborators.
///
/// The caller owns sequencing and inter-decision delays; this function owns
/// tier/dry-run semantics, rollback, and cooldown marking.
pub async fn execute_decision(
    decision: &Decision,
    services: &EngineServices,
    config: &EngineEnvConfig,
    live_cooldowns: &CooldownTracker,
    dry_cooldowns: &CooldownTracker,
    trace_id: &str,
) -> DecisionResult {
    let mut result = result_base(decision, trace_id);

    if decision.tier == Tier::Approval {
        result.pending_approval = true;
        return result;
    }

    if config.dry_run {
        info!(
            "[{}] DRY RUN {}: {} (${:.2})",
            trace_id, decision.kind, decision.reasoning, decision.estimated_impact_usd
        );
        dry_cooldowns.mark(&decision.cooldown_key());
        result.dry_run = true;
        return result;
    }

    result.executed = true;
    match dispatch(decision, services).await {
        Ok(receipt) => {
            live_cooldowns.mark(&decision.cooldown_key());
            if decision.kind == DecisionType::LpOpen
                && let Some(address) = decision.params.get("pool_address").and_then(|a| a.as_str())
            {
                live_cooldowns.mark(&format!("LP_POOL_{}", address));
            }
            info!(
                "[{}] executed {}: {} (tx {})",
                trace_id, decision.kind, decision.reasoning, receipt.tx_id
            );
            result.tx_id = Some(receipt.tx_id);
        }
        Err(e) => {
            warn!("[{}] {} failed: {}", trace_id, decision.kind, e);
            result.success = false;
            result.error = Some(e.to_string());
        }
    }
    result
}

async fn dispatch(
    decision: &Decision,
    services: &EngineServices,
) -> Result<TxReceipt, ExecutionError> {
    let missing = |what: &str| ExecutionError::NoCollaborator {
        decision_type: format!("{} ({})", decision.kind, what),
    };

    match decision.kind {
        DecisionType::CloseLosing => {
            let perp = services.perp.as_ref().ok_or_else(|| missing("perp venue"))?;
            let coin = param_str(decision, "coin")?;
            let size = param_f64(decision, "size")?;
            let is_buy = decision
                .params
                .get("is_buy")
                .and_then(|b| b.as_bool())
                .unwrap_or(true);
            perp.close_position(&coin, size, is_buy)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::OpenHedge => {
            let perp = services.perp.as_ref().ok_or_else(|| missing("perp venue"))?;
            let request = HedgeRequest {
                coin: param_str(decision, "coin")?,
                exposure_usd: param_f64(decision, "size_usd")?,
                leverage: decision
                    .params
                    .get("leverage")
                    .and_then(|l| l.as_f64())
                    .unwrap_or(1.0),
            };
            perp.hedge_treasury(request)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::CloseHedge => {
            let perp = services.perp.as_ref().ok_or_else(|| missing("perp venue"))?;
            let coin = param_str(decision, "coin")?;
            let size_usd = param_f64(decision, "size_usd")?;

            // Reduce-only: size the close off the live position, never more
            // than what is open.
            let summary = perp
                .get_account_summary()
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })?;
            let position = summary
                .positions
                .iter()
                .find(|p| p.coin == coin && p.is_short())
                .ok_or_else(|| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: format!("no open short on {}", coin),
                })?;
            let size_units = if position.mark_price > 0.0 {
                (size_usd / position.mark_price).min(position.size.abs())
            } else {
                position.size.abs()
            };
            perp.close_position(&coin, size_units, true)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::StakeIdle => {
            let staking = services.staking.as_ref().ok_or_else(|| missing("staking"))?;
            staking
                .stake_sol(param_f64(decision, "amount_sol")?)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::EmergencyUnstake => {
            let staking = services.staking.as_ref().ok_or_else(|| missing("staking"))?;
            staking
                .instant_unstake(param_f64(decision, "amount_sol")?)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::PolymarketBet => {
            let prediction = services
                .prediction
                .as_ref()
                .ok_or_else(|| missing("prediction market"))?;
            prediction
                .place_buy_order(
                    &param_str(decision, "market_id")?,
                    &param_str(decision, "token_id")?,
                    param_f64(decision, "size_usd")?,
                )
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::PolymarketExit => {
            let prediction = services
                .prediction
                .as_ref()
                .ok_or_else(|| missing("prediction market"))?;
            let market_id = param_str(decision, "market_id")?;
            let fraction = decision
                .params
                .get("fraction")
                .and_then(|f| f.as_f64())
                .unwrap_or(1.0);
            let positions = prediction
                .fetch_positions()
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })?;
            let position = positions
                .iter()
                .find(|p| p.market_id == market_id)
                .ok_or_else(|| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: format!("no open position on {}", market_id),
                })?;
            prediction
                .exit_position(position, fraction)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::LendingDeploy => {
            let lending = services.lending.as_ref().ok_or_else(|| missing("lending"))?;
            let borrow_asset = param_str(decision, "borrow_asset")?;
            let deploy_asset = param_str(decision, "deploy_asset")?;
            let amount = param_f64(decision, "amount_usd")?;

            lending
                .borrow(&borrow_asset, amount)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: format!("borrow leg: {}", e),
                })?;

            match lending.deposit(&deploy_asset, amount).await {
                Ok(receipt) => Ok(receipt),
                Err(deploy_err) => {
                    // Deploy leg failed with the borrow outstanding: repay
                    // best-effort before surfacing the failure.
                    warn!(
                        "lending deploy failed after borrow, rolling back: {}",
                        deploy_err
                    );
                    if let Err(repay_err) = lending.repay(&borrow_asset, amount).await {
                        error!("rollback repay failed: {}", repay_err);
                        return Err(ExecutionError::RollbackFailed {
                            reason: format!("{} (after deploy: {})", repay_err, deploy_err),
                        });
                    }
                    Err(ExecutionError::Failed {
                        decision_type: decision.kind.to_string(),
                        reason: format!("deploy leg rolled back: {}", deploy_err),
                    })
                }
            }
        }
        DecisionType::LendingLpLoop | DecisionType::LstLoop => {
            let lending = services.lending.as_ref().ok_or_else(|| missing("lending"))?;
            lending
                .loop_lst(
                    &param_str(decision, "lst")?,
                    param_f64(decision, "amount_usd")?,
                )
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::UnwindLoop => {
            let lending = services.lending.as_ref().ok_or_else(|| missing("lending"))?;
            lending
                .unwind_lst_loop()
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::RepayDebt => {
            let lending = services.lending.as_ref().ok_or_else(|| missing("lending"))?;
            lending
                .repay(
                    &param_str(decision, "asset")?,
                    param_f64(decision, "amount_usd")?,
                )
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::LpOpen => {
            let venue = resolve_lp_venue(services, &param_str(decision, "venue")?)?;
            venue
                .open_position(OpenLpRequest {
                    pool_address: param_str(decision, "pool_address")?,
                    pair: param_str(decision, "pair")?,
                    size_usd: param_f64(decision, "size_usd")?,
                    range_width: param_f64(decision, "range_width")?,
                })
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::LpRebalance => {
            let venue = resolve_lp_venue(services, &param_str(decision, "venue")?)?;
            venue
                .rebalance_position(&param_str(decision, "position_id")?)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::LpClaimFees => {
            let venue = resolve_lp_venue(services, &param_str(decision, "venue")?)?;
            venue
                .claim_fees(&param_str(decision, "position_id")?)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
        DecisionType::FlashArb => {
            let bridge = services.bridge.as_ref().ok_or_else(|| missing("bridge"))?;
            let opportunity = FlashArbOpportunity {
                route: param_str(decision, "route")?,
                size_usd: param_f64(decision, "size_usd")?,
                net_profit_usd: param_f64(decision, "net_profit_usd")?,
            };
            bridge
                .execute_flash_arb(&opportunity)
                .await
                .map_err(|e| ExecutionError::Failed {
                    decision_type: decision.kind.to_string(),
                    reason: e.to_string(),
                })
        }
    }
}
