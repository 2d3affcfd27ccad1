//! End-to-end decision engine scenarios over mock collaborators.

use std::sync::Arc;

use nova::application::engine::{DecisionEngine, EngineServices};
use nova::application::learning::LearningEngine;
use nova::application::runtime::CFO;
use nova::config::EngineEnvConfig;
use nova::domain::decision::{Decision, DecisionType, Tier, Urgency};
use nova::domain::message::{Message, MessagePriority, MessageType};
use nova::domain::portfolio::{PerpAccountSummary, PerpPosition, TokenBalance};
use nova::infrastructure::mock::{
    MockLendingProtocol, MockMarketDataSource, MockPerpVenue, MockWalletService,
};
use nova::infrastructure::persistence::{Database, KvRepository, MessageRepository};

struct Harness {
    engine: Arc<DecisionEngine>,
    perp: MockPerpVenue,
    lending: MockLendingProtocol,
}

/// Build an engine with only hedging enabled and everything else off, so
/// scenarios stay single-rule.
async fn harness(mut config: EngineEnvConfig) -> Harness {
    config.enable_staking = false;
    config.enable_polymarket = false;
    config.enable_lp = false;
    config.enable_flash_arb = false;

    let db = Database::in_memory().await.expect("in-memory db");
    let bus = MessageRepository::new(db.clone());
    let kv = KvRepository::new(db.clone());

    let market = MockMarketDataSource::new();
    market.set_price("SOL", 100.0).await;

    let perp = MockPerpVenue::new();
    perp.set_listed(vec!["SOL".to_string()]).await;

    let lending = MockLendingProtocol::new();

    let services = EngineServices {
        market: Some(Arc::new(market)),
        wallet: Some(Arc::new(MockWalletService::new())),
        perp: Some(Arc::new(perp.clone())),
        lending: Some(Arc::new(lending.clone())),
        ..Default::default()
    };

    let learning = LearningEngine::new(None, kv.clone());
    let engine = DecisionEngine::new(services, config, learning, bus, kv, None);
    Harness {
        engine,
        perp,
        lending,
    }
}

fn base_config() -> EngineEnvConfig {
    EngineEnvConfig::from_env().expect("defaults")
}

async fn set_exposure(perp: &MockPerpVenue, wallet_usd: f64, margin: f64) -> MockWalletService {
    let wallet = MockWalletService::new();
    wallet
        .set_tokens(vec![TokenBalance {
            mint: "native".to_string(),
            symbol: "SOL".to_string(),
            balance: wallet_usd / 100.0,
            usd_value: wallet_usd,
        }])
        .await;
    perp.set_summary(PerpAccountSummary {
        margin_available_usd: margin,
        account_value_usd: margin,
        positions: vec![],
    })
    .await;
    wallet
}

/// Engine with a SOL treasury exposure wired through the wallet mock.
async fn hedged_harness(exposure_usd: f64, margin: f64, dry_run: bool) -> (Arc<DecisionEngine>, MockPerpVenue, MessageRepository) {
    let mut config = base_config();
    config.dry_run = dry_run;
    config.enable_staking = false;
    config.enable_polymarket = false;
    config.enable_lp = false;
    config.enable_flash_arb = false;
    config.enable_lending = false;

    let db = Database::in_memory().await.expect("in-memory db");
    let bus = MessageRepository::new(db.clone());
    let kv = KvRepository::new(db.clone());

    let market = MockMarketDataSource::new();
    market.set_price("SOL", 100.0).await;
    let perp = MockPerpVenue::new();
    perp.set_listed(vec!["SOL".to_string()]).await;
    let wallet = set_exposure(&perp, exposure_usd, margin).await;

    let services = EngineServices {
        market: Some(Arc::new(market)),
        wallet: Some(Arc::new(wallet)),
        perp: Some(Arc::new(perp.clone())),
        ..Default::default()
    };
    let learning = LearningEngine::new(None, kv.clone());
    let engine = DecisionEngine::new(services, config, learning, bus.clone(), kv, None);
    (engine, perp, bus)
}

#[tokio::test]
async fn test_approval_tier_queues_without_side_effect() {
    // $600 SOL exposure, no short: target 0.50 wants a $300 hedge, which
    // lands in the approval band
    let (engine, perp, _bus) = hedged_harness(600.0, 1000.0, false).await;

    let outcome = engine.run_cycle().await;
    assert!(!outcome.skipped);
    assert_eq!(outcome.results.len(), 1);

    let result = &outcome.results[0];
    assert_eq!(result.decision.kind, DecisionType::OpenHedge);
    assert_eq!(result.decision.tier, Tier::Approval);
    assert!(!result.executed);
    assert!(result.success);
    assert!(result.pending_approval);

    // No collaborator was touched and the approval is queued
    assert!(perp.log.is_empty().await);
    let pending = engine.approvals().list();
    assert_eq!(pending.len(), 1);
    assert!((pending[0].amount_usd - 300.0).abs() < 1.0);

    // Admin approval re-dispatches exactly once at Auto
    let result = engine.execute_approved(&pending[0].id).await.unwrap();
    assert!(result.executed);
    assert!(result.success);
    assert_eq!(perp.log.count_matching("hedge_treasury:SOL").await, 1);
    assert!(engine.approvals().is_empty());

    // A second approval of the same id fails
    assert!(engine.execute_approved(&pending[0].id).await.is_err());
}

#[tokio::test]
async fn test_dry_run_executes_nothing_and_sets_short_cooldown() {
    let mut config = base_config();
    config.dry_run = true;
    let h = harness(config).await;

    // Losing short: -$40 on $100 margin trips the 25% stop
    h.perp
        .set_summary(PerpAccountSummary {
            margin_available_usd: 500.0,
            account_value_usd: 500.0,
            positions: vec![PerpPosition {
                coin: "SOL".to_string(),
                size: -1.0,
                entry_price: 96.0,
                mark_price: 100.0,
                liquidation_price: None,
                margin_used_usd: 100.0,
                unrealized_pnl_usd: -40.0,
            }],
        })
        .await;

    let outcome = h.engine.run_cycle().await;
    assert_eq!(outcome.results.len(), 1);
    let result = &outcome.results[0];
    assert_eq!(result.decision.kind, DecisionType::CloseLosing);
    assert_eq!(result.decision.urgency, Urgency::High);
    assert_eq!(result.decision.tier, Tier::Auto);
    assert!(result.dry_run);
    assert!(!result.executed);
    assert!(h.perp.log.is_empty().await);

    // The dry-run cooldown suppresses the same simulated decision on the
    // next cycle
    let outcome = h.engine.run_cycle().await;
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_liquidation_proximity_executes_live() {
    let mut config = base_config();
    config.dry_run = false;
    let h = harness(config).await;

    // Short at mark 100, liquidation 108: 8% away, inside the 15% warning
    h.perp
        .set_summary(PerpAccountSummary {
            margin_available_usd: 500.0,
            account_value_usd: 500.0,
            positions: vec![PerpPosition {
                coin: "SOL".to_string(),
                size: -2.0,
                entry_price: 95.0,
                mark_price: 100.0,
                liquidation_price: Some(108.0),
                margin_used_usd: 100.0,
                unrealized_pnl_usd: -10.0,
            }],
        })
        .await;

    let outcome = h.engine.run_cycle().await;
    assert_eq!(outcome.results.len(), 1);
    let result = &outcome.results[0];
    assert_eq!(result.decision.urgency, Urgency::Critical);
    assert_eq!(result.decision.tier, Tier::Auto);
    assert!(result.executed);
    assert!(result.success);
    assert_eq!(h.perp.log.count_matching("close_position:SOL").await, 1);
}

#[tokio::test]
async fn test_bearish_intel_raises_hedge_target() {
    let (engine, _perp, bus) = hedged_harness(1000.0, 5000.0, true).await;

    // Bearish scout + guardian alert in the CFO window: risk 1.0+0.3+0.2=1.5,
    // target 0.50*1.5=0.75 -> $750 hedge on $1,000 exposure
    bus
        .send(&Message::new(
            "nova-scout",
            CFO,
            MessageType::Intel,
            MessagePriority::Medium,
            serde_json::json!({"intel_type": "scout_sentiment", "crypto_bullish": false, "summary": ""}),
            None,
        ))
        .await
        .unwrap();
    bus
        .send(&Message::new(
            "nova-guardian",
            CFO,
            MessageType::Alert,
            MessagePriority::High,
            serde_json::json!({"severity": "high", "description": "drain risk on lending pool"}),
            None,
        ))
        .await
        .unwrap();

    let outcome = engine.run_cycle().await;
    let intel = outcome.intel.expect("intel");
    assert!((intel.risk_multiplier - 1.5).abs() < 1e-9);

    assert_eq!(outcome.results.len(), 1);
    let decision = &outcome.results[0].decision;
    assert_eq!(decision.kind, DecisionType::OpenHedge);
    assert_eq!(decision.urgency, Urgency::High);
    let size = decision.params["size_usd"].as_f64().unwrap();
    assert!((size - 750.0).abs() < 1.0);
}

#[tokio::test]
async fn test_overlapping_cycles_skip() {
    let config = base_config();
    let h = harness(config).await;

    let (first, second) = tokio::join!(h.engine.run_cycle(), h.engine.run_cycle());
    assert!(first.skipped != second.skipped, "exactly one cycle runs");
}

#[tokio::test]
async fn test_failed_deploy_rolls_back_the_borrow() {
    let mut config = base_config();
    config.dry_run = false;
    let h = harness(config).await;
    h.lending.fail_deposits(true).await;

    let decision = Decision {
        kind: DecisionType::LendingDeploy,
        reasoning: "spread play".to_string(),
        params: serde_json::json!({
            "borrow_asset": "USDC",
            "deploy_asset": "JITOSOL",
            "amount_usd": 250.0,
        }),
        urgency: Urgency::Low,
        estimated_impact_usd: 250.0,
        tier: Tier::Auto,
        intel_used: vec![],
    };
    let result = h.engine.execute_manual(decision).await;

    assert!(result.executed);
    assert!(!result.success);
    assert!(result.error.is_some());
    // Borrow leg went out, deploy failed, repay rolled it back
    assert_eq!(h.lending.log.count_matching("borrow:USDC:250").await, 1);
    assert_eq!(h.lending.log.count_matching("repay:USDC:250").await, 1);
    assert_eq!(h.lending.log.count_matching("deposit").await, 0);
}
