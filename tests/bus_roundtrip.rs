//! Durable bus delivery contract: ordering, acknowledgement, expiry, and
//! agent state round-trips over an in-memory database.

use chrono::{Duration, Utc};
use nova::application::runtime::AgentContext;
use nova::domain::message::{HeartbeatStatus, Message, MessagePriority, MessageType};
use nova::infrastructure::persistence::{
    AgentRepository, Database, KvRepository, MessageRepository,
};

async fn bus() -> (Database, MessageRepository) {
    let db = Database::in_memory().await.expect("in-memory db");
    let bus = MessageRepository::new(db.clone());
    (db, bus)
}

fn message(to: &str, priority: MessagePriority, payload: serde_json::Value) -> Message {
    Message::new("nova-scout", to, MessageType::Intel, priority, payload, None)
}

#[tokio::test]
async fn test_send_then_read_returns_exactly_once_until_ack() {
    let (_db, bus) = bus().await;
    let sent = message("nova-supervisor", MessagePriority::Medium, serde_json::json!({"n": 1}));
    bus.send(&sent).await.unwrap();

    let batch = bus.read_for("nova-supervisor", 100).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, sent.id);
    assert_eq!(batch[0].payload["n"], 1);

    // Unacked: still delivered on the next poll
    assert_eq!(bus.read_for("nova-supervisor", 100).await.unwrap().len(), 1);

    bus.acknowledge(sent.id).await.unwrap();
    assert!(bus.read_for("nova-supervisor", 100).await.unwrap().is_empty());

    // Idempotent re-ack
    bus.acknowledge(sent.id).await.unwrap();
}

#[tokio::test]
async fn test_priority_then_age_ordering_with_limit() {
    let (_db, bus) = bus().await;

    let mut low_old = message("nova-supervisor", MessagePriority::Low, serde_json::json!({}));
    low_old.created_at = Utc::now() - Duration::minutes(30);
    let mut medium = message("nova-supervisor", MessagePriority::Medium, serde_json::json!({}));
    medium.created_at = Utc::now() - Duration::minutes(20);
    let mut critical_new = message("nova-supervisor", MessagePriority::Critical, serde_json::json!({}));
    critical_new.created_at = Utc::now() - Duration::minutes(1);
    let mut high_old = message("nova-supervisor", MessagePriority::High, serde_json::json!({}));
    high_old.created_at = Utc::now() - Duration::minutes(25);
    let mut high_new = message("nova-supervisor", MessagePriority::High, serde_json::json!({}));
    high_new.created_at = Utc::now() - Duration::minutes(2);

    for msg in [&low_old, &medium, &critical_new, &high_old, &high_new] {
        bus.send(msg).await.unwrap();
    }

    let batch = bus.read_for("nova-supervisor", 10).await.unwrap();
    let ids: Vec<_> = batch.iter().map(|m| m.id).collect();
    assert_eq!(
        ids,
        vec![critical_new.id, high_old.id, high_new.id, medium.id, low_old.id]
    );

    // Priorities never decrease along the batch
    for window in batch.windows(2) {
        assert!(window[0].priority <= window[1].priority);
    }

    // Limit honoured
    assert_eq!(bus.read_for("nova-supervisor", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_messages_never_delivered() {
    let (_db, bus) = bus().await;

    let mut expired = message("nova-cfo", MessagePriority::High, serde_json::json!({}));
    expired.expires_at = Some(Utc::now() - Duration::minutes(5));
    bus.send(&expired).await.unwrap();

    let fresh = Message::new(
        "nova-scout",
        "nova-cfo",
        MessageType::Intel,
        MessagePriority::High,
        serde_json::json!({}),
        Some(Duration::hours(1)),
    );
    bus.send(&fresh).await.unwrap();

    let batch = bus.read_for("nova-cfo", 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, fresh.id);

    // GC reclaims the expired row
    let removed = bus.delete_expired(Utc::now()).await.unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_messages_are_per_recipient() {
    let (_db, bus) = bus().await;
    bus.send(&message("nova-cfo", MessagePriority::Medium, serde_json::json!({})))
        .await
        .unwrap();
    assert!(bus.read_for("nova-supervisor", 10).await.unwrap().is_empty());
    assert_eq!(bus.read_for("nova-cfo", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_acknowledged_audit_window_reclaim() {
    let (_db, bus) = bus().await;
    let msg = message("nova-supervisor", MessagePriority::Low, serde_json::json!({}));
    bus.send(&msg).await.unwrap();
    bus.acknowledge(msg.id).await.unwrap();

    // Inside the audit window nothing is reclaimed
    let removed = bus
        .delete_acknowledged_before(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(removed, 0);

    // Past the window the row goes
    let removed = bus
        .delete_acknowledged_before(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_registration_is_idempotent() {
    let db = Database::in_memory().await.unwrap();
    let bus = MessageRepository::new(db.clone());
    let agents = AgentRepository::new(db.clone());
    let kv = KvRepository::new(db.clone());

    let ctx = AgentContext::new("nova-scout", "scout", bus, agents.clone(), kv);
    assert!(ctx.start().await.unwrap());
    // Second start is a no-op
    assert!(!ctx.start().await.unwrap());
    ctx.stop().await;
    assert!(ctx.start().await.unwrap());

    let registrations = agents.list_registrations().await.unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].name, "nova-scout");
}

#[tokio::test]
async fn test_agent_state_round_trip() {
    let db = Database::in_memory().await.unwrap();
    let kv = KvRepository::new(db);

    let state = serde_json::json!({
        "messages_processed": 42,
        "recent_x_post_hashes": ["a1b2", "c3d4"],
        "last_narrative_post_at": "2026-08-01T10:00:00Z",
    });
    kv.save_agent_state("nova-supervisor", &state).await.unwrap();

    let restored = kv.restore_agent_state("nova-supervisor").await.unwrap();
    assert_eq!(restored, Some(state));

    // Unknown agent restores nothing
    assert_eq!(kv.restore_agent_state("nova-ghost").await.unwrap(), None);
}

#[tokio::test]
async fn test_terminal_heartbeat_on_stop() {
    let db = Database::in_memory().await.unwrap();
    let bus = MessageRepository::new(db.clone());
    let agents = AgentRepository::new(db.clone());
    let kv = KvRepository::new(db.clone());

    let ctx = AgentContext::new("nova-analyst", "analyst", bus, agents.clone(), kv);
    ctx.start().await.unwrap();

    let beats = agents.list_heartbeats().await.unwrap();
    assert_eq!(beats[0].status, HeartbeatStatus::Alive);

    ctx.stop().await;
    let beats = agents.list_heartbeats().await.unwrap();
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0].status, HeartbeatStatus::Disabled);
}
