//! CFO agent: the decision engine's face on the bus.
//!
//! Runs the autonomous decision interval, sweeps the approval queue, and
//! handles the admin command set. Cycle summaries go back to the supervisor
//! as reports for the admin sink.

use crate::application::engine::DecisionEngine;
use crate::application::reporting::{
    format_approvals, format_cycle_summary, format_decision_result, format_portfolio_status,
};
use crate::application::runtime::{AgentContext, WorkerAgent};
use crate::domain::decision::{Decision, DecisionType, Tier, Urgency};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::payloads::CfoCommand;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Approval queue sweep cadence.
const APPROVAL_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

pub struct CfoAgent {
    ctx: Arc<AgentContext>,
    engine: Arc<DecisionEngine>,
}

impl CfoAgent {
    pub fn new(ctx: Arc<AgentContext>, engine: Arc<DecisionEngine>) -> Arc<Self> {
        Arc::new(Self { ctx, engine })
    }

    async fn run_and_report(ctx: &Arc<AgentContext>, engine: &Arc<DecisionEngine>) {
        ctx.set_task(Some("deciding")).await;
        let outcome = engine.run_cycle().await;
        if !outcome.skipped && !outcome.results.is_empty() {
            ctx.report_to_supervisor(
                MessageType::Report,
                MessagePriority::Medium,
                serde_json::json!({
                    "report_type": "cycle_summary",
                    "trace_id": outcome.trace_id,
                    "summary": format_cycle_summary(&outcome),
                }),
            )
            .await;
        }
        ctx.set_task(None).await;
    }

    async fn report(&self, summary: String) {
        self.ctx
            .report_to_supervisor(
                MessageType::Report,
                MessagePriority::Medium,
                serde_json::json!({"summary": summary}),
            )
            .await;
    }

    async fn close_all_perps(&self) -> Vec<String> {
        let portfolio = self.engine.snapshot().await;
        let mut lines = Vec::new();
        for position in &portfolio.perp.positions {
            let decision = Decision {
                kind: DecisionType::CloseLosing,
                reasoning: format!("admin close of {} position", position.coin),
                params: serde_json::json!({
                    "coin": position.coin,
                    "size": position.size.abs(),
                    "is_buy": position.is_short(),
                }),
                urgency: Urgency::High,
                estimated_impact_usd: position.notional_usd(),
                tier: Tier::Auto,
                intel_used: vec![],
            };
            let result = self.engine.execute_manual(decision).await;
            lines.push(format_decision_result(&result));
        }
        lines
    }

    async fn close_all_predictions(&self) -> Vec<String> {
        let Some(prediction) = self.engine.services().prediction.clone() else {
            return vec!["prediction market not configured".to_string()];
        };
        let positions = match prediction.fetch_positions().await {
            Ok(positions) => positions,
            Err(e) => return vec![format!("position fetch failed: {}", e)],
        };
        let mut lines = Vec::new();
        for position in positions {
            let decision = Decision {
                kind: DecisionType::PolymarketExit,
                reasoning: format!("admin exit of '{}'", position.question),
                params: serde_json::json!({
                    "market_id": position.market_id,
                    "fraction": 1.0,
                }),
                urgency: Urgency::High,
                estimated_impact_usd: position.size_usd,
                tier: Tier::Auto,
                intel_used: vec![],
            };
            let result = self.engine.execute_manual(decision).await;
            lines.push(format_decision_result(&result));
        }
        lines
    }

    async fn handle_command(&self, command: &CfoCommand) -> Result<()> {
        let arg_f64 = |index: usize| command.args.get(index).and_then(|a| a.parse::<f64>().ok());

        match command.command.as_str() {
            "cfo_stop" => {
                self.engine.pause();
                self.report("🛑 Decision engine paused.".to_string()).await;
            }
            "cfo_start" => {
                self.engine.resume();
                self.report("▶️ Decision engine resumed.".to_string()).await;
            }
            "cfo_status" => {
                let portfolio = self.engine.snapshot().await;
                let mut summary = format_portfolio_status(&portfolio);
                summary.push('\n');
                summary.push_str(&format_approvals(&self.engine.approvals().list()));
                if self.engine.is_paused() {
                    summary.push_str("\n(engine paused)");
                }
                if self.engine.config().dry_run {
                    summary.push_str("\n(dry-run mode)");
                }
                self.report(summary).await;
            }
            "cfo_scan" | "cfo_decide" | "market_crash" | "scout_intel" => {
                if command.command == "market_crash" {
                    warn!("nova-cfo: market crash escalation, running immediate cycle");
                }
                let outcome = self.engine.run_cycle().await;
                self.report(format_cycle_summary(&outcome)).await;
            }
            "cfo_approve" => {
                let Some(id) = command.args.first() else {
                    self.report("Usage: cfo_approve <id>".to_string()).await;
                    return Ok(());
                };
                match self.engine.execute_approved(id).await {
                    Ok(result) => self.report(format_decision_result(&result)).await,
                    Err(e) => self.report(format!("❌ {}", e)).await,
                }
            }
            "cfo_close_poly" => {
                let lines = self.close_all_predictions().await;
                self.report(lines.join("\n")).await;
            }
            "cfo_close_hl" => {
                let lines = self.close_all_perps().await;
                self.report(lines.join("\n")).await;
            }
            "cfo_close_all" | "emergency_exit" => {
                if command.command == "emergency_exit" {
                    self.engine.pause();
                }
                let mut lines = self.close_all_perps().await;
                lines.extend(self.close_all_predictions().await);
                if command.command == "emergency_exit" {
                    lines.push("🛑 Engine paused after emergency exit.".to_string());
                }
                self.report(lines.join("\n")).await;
            }
            "cfo_stake" => {
                let Some(amount) = arg_f64(0) else {
                    self.report("Usage: cfo_stake <amount_sol>".to_string()).await;
                    return Ok(());
                };
                let decision = Decision {
                    kind: DecisionType::StakeIdle,
                    reasoning: format!("admin stake of {:.2} SOL", amount),
                    params: serde_json::json!({"amount_sol": amount}),
                    urgency: Urgency::Medium,
                    estimated_impact_usd: amount * self.engine.snapshot().await.sol_price_usd,
                    tier: Tier::Auto,
                    intel_used: vec![],
                };
                let result = self.engine.execute_manual(decision).await;
                self.report(format_decision_result(&result)).await;
            }
            "cfo_deposit" => {
                let (Some(asset), Some(amount)) = (command.args.first(), arg_f64(1)) else {
                    self.report("Usage: cfo_deposit <asset> <amount>".to_string()).await;
                    return Ok(());
                };
                let Some(lending) = self.engine.services().lending.clone() else {
                    self.report("lending not configured".to_string()).await;
                    return Ok(());
                };
                if self.engine.config().dry_run {
                    self.report(format!("🧪 DRY RUN deposit {} {}", amount, asset)).await;
                    return Ok(());
                }
                match lending.deposit(asset, amount).await {
                    Ok(receipt) => {
                        self.report(format!("✅ deposited {} {} (tx {})", amount, asset, receipt.tx_id))
                            .await
                    }
                    Err(e) => self.report(format!("❌ deposit failed: {}", e)).await,
                }
            }
            "cfo_hedge" => {
                let (Some(exposure), Some(leverage)) = (arg_f64(0), arg_f64(1)) else {
                    self.report("Usage: cfo_hedge <exposureUsd> <leverage>".to_string()).await;
                    return Ok(());
                };
                let decision = Decision {
                    kind: DecisionType::OpenHedge,
                    reasoning: format!("admin hedge ${:.0} at {:.1}x", exposure, leverage),
                    params: serde_json::json!({
                        "coin": "SOL",
                        "size_usd": exposure,
                        "leverage": leverage,
                    }),
                    urgency: Urgency::High,
                    estimated_impact_usd: exposure,
                    tier: Tier::Auto,
                    intel_used: vec![],
                };
                let result = self.engine.execute_manual(decision).await;
                self.report(format_decision_result(&result)).await;
            }
            other => {
                debug!("nova-cfo: unknown command '{}'", other);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerAgent for CfoAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        if self.engine.config().auto_decisions {
            let ctx = Arc::clone(&self.ctx);
            let engine = Arc::clone(&self.engine);
            let interval = Duration::from_secs(self.engine.config().decision_interval_min * 60);
            self.ctx
                .add_interval(interval, "decision-cycle", move || {
                    let ctx = Arc::clone(&ctx);
                    let engine = Arc::clone(&engine);
                    async move {
                        CfoAgent::run_and_report(&ctx, &engine).await;
                    }
                })
                .await;
            info!(
                "nova-cfo: autonomous decisions every {}min{}",
                self.engine.config().decision_interval_min,
                if self.engine.config().dry_run { " (dry run)" } else { "" }
            );
        } else {
            info!("nova-cfo: autonomous decisions disabled, command-only");
        }

        let engine = Arc::clone(&self.engine);
        self.ctx
            .add_interval(APPROVAL_SWEEP_INTERVAL, "approval-sweep", move || {
                let engine = Arc::clone(&engine);
                async move {
                    engine.sweep_approvals();
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        match message.kind {
            MessageType::Command => {
                let command: CfoCommand = serde_json::from_value(message.payload.clone())?;
                info!("nova-cfo: command '{}' from {}", command.command, message.from);
                self.handle_command(&command).await
            }
            // Intel and alerts stay on the bus for the next cycle's consult
            // window; acking them here would not remove them from it.
            MessageType::Intel | MessageType::Alert => Ok(()),
            _ => {
                debug!("nova-cfo: ignoring {} from {}", message.kind, message.from);
                Ok(())
            }
        }
    }
}
