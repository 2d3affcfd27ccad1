//! Human-readable digests for the admin sink.

use crate::application::engine::{CycleOutcome, PendingApproval};
use crate::domain::decision::DecisionResult;
use crate::domain::portfolio::PortfolioState;

fn usd(amount: f64) -> String {
    if amount.abs() >= 1000.0 {
        format!("${:.0}", amount)
    } else {
        format!("${:.2}", amount)
    }
}

pub fn format_portfolio_status(portfolio: &PortfolioState) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "💼 Portfolio {} | SOL {:.2} (+{:.2} staked) | USDC {}\n",
        usd(portfolio.total_portfolio_usd),
        portfolio.sol_balance,
        portfolio.stake.staked_sol,
        usd(portfolio.usdc_balance)
    ));
    out.push_str(&format!(
        "Hedge {:.0}% of {} hedgeable",
        portfolio.hedge_ratio * 100.0,
        usd(portfolio.hedgeable_usd())
    ));

    if !portfolio.perp.positions.is_empty() {
        out.push('\n');
        for position in &portfolio.perp.positions {
            let side = if position.is_short() { "SHORT" } else { "LONG" };
            out.push_str(&format!(
                "  {} {} {} @ {} (uPnL {})\n",
                side,
                position.size.abs(),
                position.coin,
                usd(position.mark_price),
                usd(position.unrealized_pnl_usd)
            ));
        }
    }
    if let Some(lending) = &portfolio.lending
        && lending.borrows_usd > 0.0
    {
        out.push_str(&format!(
            "\nLending: {} deposited, {} borrowed, health {:.2}",
            usd(lending.deposits_usd),
            usd(lending.borrows_usd),
            lending.health_factor
        ));
    }
    out
}

pub fn format_decision_result(result: &DecisionResult) -> String {
    let decision = &result.decision;
    let marker = if result.pending_approval {
        "⏳"
    } else if result.dry_run {
        "🧪"
    } else if result.success {
        "✅"
    } else {
        "❌"
    };
    let mut line = format!(
        "{} {} [{}] {} ({})",
        marker,
        decision.kind,
        decision.tier,
        decision.reasoning,
        usd(decision.estimated_impact_usd)
    );
    if let Some(tx_id) = &result.tx_id {
        line.push_str(&format!(" tx {}", tx_id));
    }
    if let Some(error) = &result.error {
        line.push_str(&format!(" — {}", error));
    }
    line
}

pub fn format_cycle_summary(outcome: &CycleOutcome) -> String {
    if outcome.skipped {
        return format!("🧠 Cycle [{}] skipped (already running)", outcome.trace_id);
    }

    let mut out = format!("🧠 Cycle [{}]", outcome.trace_id);
    if let Some(intel) = &outcome.intel {
        out.push_str(&format!(
            " | risk x{:.2} ({:?})",
            intel.risk_multiplier,
            intel.condition()
        ));
    }
    if let Some(portfolio) = &outcome.portfolio {
        out.push_str(&format!(" | {}", usd(portfolio.total_portfolio_usd)));
    }
    out.push('\n');

    if outcome.results.is_empty() {
        out.push_str("No action this cycle.");
    } else {
        for result in &outcome.results {
            out.push_str(&format_decision_result(result));
            out.push('\n');
        }
    }
    out
}

pub fn format_approvals(approvals: &[PendingApproval]) -> String {
    if approvals.is_empty() {
        return "No pending approvals.".to_string();
    }
    let mut out = String::from("⏳ Pending approvals:\n");
    for entry in approvals {
        out.push_str(&format!(
            "  [{}] {} ({}) expires {}\n",
            entry.id,
            entry.description,
            usd(entry.amount_usd),
            entry.expires_at.format("%H:%M:%S")
        ));
    }
    out.push_str("Approve with: cfo_approve <id>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::{Decision, DecisionType, Tier, Urgency};

    fn result(success: bool, pending: bool, dry_run: bool) -> DecisionResult {
        DecisionResult {
            decision: Decision {
                kind: DecisionType::OpenHedge,
                reasoning: "drift above band".to_string(),
                params: serde_json::json!({"coin": "SOL"}),
                urgency: Urgency::High,
                estimated_impact_usd: 700.0,
                tier: Tier::Notify,
                intel_used: vec![],
            },
            executed: !pending && !dry_run,
            success,
            tx_id: success.then(|| "tx-123".to_string()),
            error: (!success).then(|| "venue rejected order".to_string()),
            dry_run,
            pending_approval: pending,
            trace_id: "cycle-1".to_string(),
        }
    }

    #[test]
    fn test_success_and_failure_markers() {
        assert!(format_decision_result(&result(true, false, false)).starts_with("✅"));
        let failed = format_decision_result(&result(false, false, false));
        assert!(failed.starts_with("❌"));
        assert!(failed.contains("venue rejected order"));
    }

    #[test]
    fn test_pending_and_dry_run_markers() {
        assert!(format_decision_result(&result(true, true, false)).starts_with("⏳"));
        assert!(format_decision_result(&result(true, false, true)).starts_with("🧪"));
    }

    #[test]
    fn test_portfolio_status_lines() {
        let portfolio = PortfolioState {
            total_portfolio_usd: 12_345.0,
            sol_balance: 10.5,
            usdc_balance: 420.0,
            ..Default::default()
        };
        let text = format_portfolio_status(&portfolio);
        assert!(text.contains("$12345"));
        assert!(text.contains("SOL 10.50"));
    }
}
