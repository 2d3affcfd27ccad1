//! Learning retrospective: persistence, caching and EMA blending.

use std::sync::Arc;

use chrono::{Duration, Utc};
use nova::application::learning::LearningEngine;
use nova::domain::learning::{AdaptiveParams, ClosedPosition, StrategyKind};
use nova::infrastructure::mock::MockPositionLedger;
use nova::infrastructure::persistence::{Database, KvRepository};

fn losing_bet(days_ago: i64) -> ClosedPosition {
    ClosedPosition {
        strategy: StrategyKind::Polymarket,
        pnl_usd: -10.0,
        opened_at: Utc::now() - Duration::days(days_ago) - Duration::hours(6),
        closed_at: Utc::now() - Duration::days(days_ago),
        chain: None,
        pair: None,
        out_of_range: None,
        rebalances: None,
        predicted_prob: Some(0.6),
        won: Some(false),
    }
}

#[tokio::test]
async fn test_no_ledger_returns_defaults() {
    let kv = KvRepository::new(Database::in_memory().await.unwrap());
    let engine = LearningEngine::new(None, kv);
    let params = engine.current().await;
    assert_eq!(params.kelly_multiplier, 1.0);
    assert_eq!(params.confidence, 0.0);
}

#[tokio::test]
async fn test_losing_history_blends_kelly_down_and_persists() {
    let db = Database::in_memory().await.unwrap();
    let kv = KvRepository::new(db);
    let ledger = Arc::new(MockPositionLedger::new());
    ledger
        .set_positions((0..8).map(losing_bet).collect())
        .await;

    let engine = LearningEngine::new(Some(ledger), kv.clone());
    let params = engine.current().await;

    // Fresh derivation says 0.5; EMA against the 1.0 prior lands at 0.85
    assert!((params.kelly_multiplier - 0.85).abs() < 1e-9);
    assert_eq!(params.strategy_samples.get("polymarket"), Some(&8));
    assert!(params.confidence > 0.0);

    // The blended struct was persisted for the next process
    let stored = kv
        .get("learning:adaptive_params")
        .await
        .unwrap()
        .expect("persisted params");
    let stored: AdaptiveParams = serde_json::from_value(stored).unwrap();
    assert!((stored.kelly_multiplier - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_cache_serves_within_ttl() {
    let kv = KvRepository::new(Database::in_memory().await.unwrap());
    let ledger = Arc::new(MockPositionLedger::new());
    ledger
        .set_positions((0..8).map(losing_bet).collect())
        .await;

    let engine = LearningEngine::new(Some(ledger.clone()), kv);
    let first = engine.current().await;

    // New history arrives, but the 15min cache still serves the old view
    ledger.set_positions(Vec::new()).await;
    let second = engine.current().await;
    assert_eq!(first.kelly_multiplier, second.kelly_multiplier);
    assert_eq!(first.updated_at, second.updated_at);
}

#[tokio::test]
async fn test_ninety_day_window_excludes_old_closes() {
    let kv = KvRepository::new(Database::in_memory().await.unwrap());
    let ledger = Arc::new(MockPositionLedger::new());
    // All trades closed well outside the retrospective window
    ledger
        .set_positions((0..8).map(|i| losing_bet(100 + i)).collect())
        .await;

    let engine = LearningEngine::new(Some(ledger), kv);
    let params = engine.current().await;
    assert_eq!(params.kelly_multiplier, 1.0);
    assert_eq!(params.total_samples(), 0);
}
