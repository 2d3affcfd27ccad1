//! Admin command handling through the CFO agent's bus interface.

use std::sync::Arc;

use nova::application::agents::cfo::CfoAgent;
use nova::application::engine::{DecisionEngine, EngineServices};
use nova::application::learning::LearningEngine;
use nova::application::runtime::{AgentContext, CFO, SUPERVISOR, WorkerAgent, drain_batch};
use nova::config::EngineEnvConfig;
use nova::domain::message::{Message, MessagePriority, MessageType};
use nova::domain::portfolio::{PerpAccountSummary, TokenBalance};
use nova::infrastructure::mock::{MockMarketDataSource, MockPerpVenue, MockWalletService};
use nova::infrastructure::persistence::{
    AgentRepository, Database, KvRepository, MessageRepository,
};

struct Harness {
    cfo: Arc<CfoAgent>,
    engine: Arc<DecisionEngine>,
    bus: MessageRepository,
    perp: MockPerpVenue,
}

async fn harness(dry_run: bool, exposure_usd: f64) -> Harness {
    let mut config = EngineEnvConfig::from_env().expect("defaults");
    config.dry_run = dry_run;
    config.enable_staking = false;
    config.enable_polymarket = false;
    config.enable_lp = false;
    config.enable_flash_arb = false;
    config.enable_lending = false;

    let db = Database::in_memory().await.expect("in-memory db");
    let bus = MessageRepository::new(db.clone());
    let agents = AgentRepository::new(db.clone());
    let kv = KvRepository::new(db.clone());

    let market = MockMarketDataSource::new();
    market.set_price("SOL", 100.0).await;
    let perp = MockPerpVenue::new();
    perp.set_listed(vec!["SOL".to_string()]).await;
    perp.set_summary(PerpAccountSummary {
        margin_available_usd: 1000.0,
        account_value_usd: 1000.0,
        positions: vec![],
    })
    .await;
    let wallet = MockWalletService::new();
    if exposure_usd > 0.0 {
        wallet
            .set_tokens(vec![TokenBalance {
                mint: "native".to_string(),
                symbol: "SOL".to_string(),
                balance: exposure_usd / 100.0,
                usd_value: exposure_usd,
            }])
            .await;
    }

    let services = EngineServices {
        market: Some(Arc::new(market)),
        wallet: Some(Arc::new(wallet)),
        perp: Some(Arc::new(perp.clone())),
        ..Default::default()
    };
    let learning = LearningEngine::new(None, kv.clone());
    let engine = DecisionEngine::new(services, config, learning, bus.clone(), kv.clone(), None);

    let ctx = AgentContext::new(CFO, "cfo", bus.clone(), agents, kv);
    let cfo = CfoAgent::new(ctx, engine.clone());

    Harness {
        cfo,
        engine,
        bus,
        perp,
    }
}

async fn send_command(bus: &MessageRepository, command: &str, args: Vec<&str>) {
    let msg = Message::new(
        SUPERVISOR,
        CFO,
        MessageType::Command,
        MessagePriority::High,
        serde_json::json!({
            "command": command,
            "args": args,
        }),
        None,
    );
    bus.send(&msg).await.unwrap();
}

async fn drain(h: &Harness) {
    let worker: Arc<dyn WorkerAgent> = h.cfo.clone();
    let ctx = worker.context().clone();
    drain_batch(&worker, &ctx, 10).await;
}

async fn supervisor_reports(bus: &MessageRepository) -> Vec<Message> {
    bus.read_for(SUPERVISOR, 50).await.unwrap()
}

#[tokio::test]
async fn test_status_command_reports_portfolio() {
    let h = harness(true, 0.0).await;
    send_command(&h.bus, "cfo_status", vec![]).await;
    drain(&h).await;

    let reports = supervisor_reports(&h.bus).await;
    assert_eq!(reports.len(), 1);
    let summary = reports[0].payload["summary"].as_str().unwrap();
    assert!(summary.contains("Portfolio"));
    assert!(summary.contains("dry-run"));

    // The command row was acknowledged
    assert!(h.bus.read_for(CFO, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_and_start_toggle_the_engine() {
    let h = harness(true, 0.0).await;

    send_command(&h.bus, "cfo_stop", vec![]).await;
    drain(&h).await;
    assert!(h.engine.is_paused());

    // A paused engine skips its cycle
    let outcome = h.engine.run_cycle().await;
    assert!(outcome.skipped);

    send_command(&h.bus, "cfo_start", vec![]).await;
    drain(&h).await;
    assert!(!h.engine.is_paused());
}

#[tokio::test]
async fn test_approve_command_dispatches_queued_decision() {
    // $600 exposure in live mode: the $300 hedge queues for approval
    let h = harness(false, 600.0).await;
    let outcome = h.engine.run_cycle().await;
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].pending_approval);
    let pending = h.engine.approvals().list();
    assert_eq!(pending.len(), 1);

    send_command(&h.bus, "cfo_approve", vec![&pending[0].id]).await;
    drain(&h).await;

    assert_eq!(h.perp.log.count_matching("hedge_treasury:SOL").await, 1);
    assert!(h.engine.approvals().is_empty());

    let reports = supervisor_reports(&h.bus).await;
    let approval_report = reports
        .iter()
        .filter_map(|m| m.payload["summary"].as_str())
        .find(|s| s.contains("OPEN_HEDGE"))
        .expect("approval execution reported");
    assert!(approval_report.contains("✅"));
}

#[tokio::test]
async fn test_unknown_approval_id_reports_error() {
    let h = harness(false, 0.0).await;
    send_command(&h.bus, "cfo_approve", vec!["deadbeef"]).await;
    drain(&h).await;

    let reports = supervisor_reports(&h.bus).await;
    let summary = reports[0].payload["summary"].as_str().unwrap();
    assert!(summary.contains("❌"));
    assert!(summary.contains("deadbeef"));
}

#[tokio::test]
async fn test_emergency_exit_closes_and_pauses() {
    let h = harness(false, 0.0).await;
    h.perp
        .set_summary(PerpAccountSummary {
            margin_available_usd: 500.0,
            account_value_usd: 500.0,
            positions: vec![nova::domain::portfolio::PerpPosition {
                coin: "SOL".to_string(),
                size: -2.0,
                entry_price: 100.0,
                mark_price: 100.0,
                liquidation_price: None,
                margin_used_usd: 100.0,
                unrealized_pnl_usd: 5.0,
            }],
        })
        .await;

    send_command(&h.bus, "emergency_exit", vec![]).await;
    drain(&h).await;

    assert!(h.engine.is_paused());
    assert_eq!(h.perp.log.count_matching("close_position:SOL").await, 1);
}
