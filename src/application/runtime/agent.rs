//! Shared agent runtime.
//!
//! `AgentContext` owns everything a worker needs to live on the swarm:
//! registration, heartbeats, durable messaging, state persistence and a
//! registry of recurring tasks so `stop()` is a single cancel pass.
//! Bus and heartbeat failures are non-fatal; they log at warn/debug and the
//! agent keeps running.

use crate::domain::message::{
    AgentRegistration, Heartbeat, HeartbeatStatus, Message, MessagePriority, MessageType,
};
use crate::infrastructure::persistence::{AgentRepository, KvRepository, MessageRepository};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The supervisor's bus address.
pub const SUPERVISOR: &str = "nova-supervisor";

/// The decision engine's bus address.
pub const CFO: &str = "nova-cfo";

pub struct AgentContext {
    name: String,
    kind: String,
    bus: MessageRepository,
    registry: AgentRepository,
    kv: KvRepository,
    intervals: Mutex<Vec<JoinHandle<()>>>,
    current_task: RwLock<Option<String>>,
    started: AtomicBool,
    stopping: AtomicBool,
}

impl AgentContext {
    pub fn new(
        name: &str,
        kind: &str,
        bus: MessageRepository,
        registry: AgentRepository,
        kv: KvRepository,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kind: kind.to_string(),
            bus,
            registry,
            kv,
            intervals: Mutex::new(Vec::new()),
            current_task: RwLock::new(None),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Idempotent startup: upsert the registration and write the first
    /// heartbeat. Returns false when already started.
    pub async fn start(&self) -> Result<bool> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("{}: start() called twice, ignoring", self.name);
            return Ok(false);
        }
        self.stopping.store(false, Ordering::SeqCst);

        self.registry
            .register(&AgentRegistration {
                name: self.name.clone(),
                kind: self.kind.clone(),
                enabled: true,
                config: serde_json::json!({}),
                updated_at: Utc::now(),
            })
            .await?;

        self.beat(HeartbeatStatus::Alive).await;
        info!("{}: started", self.name);
        Ok(true)
    }

    /// Cancel every registered interval and write the terminal heartbeat.
    /// Safe to call on any exit path.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);

        let mut intervals = self.intervals.lock().await;
        for handle in intervals.drain(..) {
            handle.abort();
        }
        drop(intervals);

        self.beat(HeartbeatStatus::Disabled).await;
        self.started.store(false, Ordering::SeqCst);
        info!("{}: stopped", self.name);
    }

    /// Record a free-form task label carried in the next heartbeats.
    pub async fn set_task(&self, label: Option<&str>) {
        *self.current_task.write().await = label.map(|l| l.to_string());
    }

    /// Write one heartbeat row. Failures log at warn and are swallowed.
    pub async fn beat(&self, status: HeartbeatStatus) {
        let heartbeat = Heartbeat {
            name: self.name.clone(),
            status,
            current_task: self.current_task.read().await.clone(),
            last_beat: Utc::now(),
        };
        if let Err(e) = self.registry.beat(&heartbeat).await {
            warn!("{}: heartbeat write failed: {}", self.name, e);
        }
    }

    /// Spawn the recurring heartbeat writer.
    pub async fn start_heartbeat(self: Arc<Self>, interval_ms: u64) {
        let ctx = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // start() already wrote the first beat
            ticker.tick().await;
            loop {
                ticker.tick().await;
                ctx.beat(HeartbeatStatus::Alive).await;
            }
        });
        self.register_task(handle).await;
    }

    /// Spawn a recurring task and register it for teardown. The closure is
    /// invoked once per tick; a slow tick delays only this agent.
    pub async fn add_interval<F, Fut>(&self, interval: Duration, label: &str, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let label = label.to_string();
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval() fires immediately; wait one full period first
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("{}: tick {}", name, label);
                task().await;
            }
        });
        self.register_task(handle).await;
    }

    pub async fn register_task(&self, handle: JoinHandle<()>) {
        self.intervals.lock().await.push(handle);
    }

    /// Durable enqueue. Send failures are non-fatal.
    pub async fn send_message(
        &self,
        to: &str,
        kind: MessageType,
        priority: MessagePriority,
        payload: serde_json::Value,
        ttl: Option<chrono::Duration>,
    ) {
        let message = Message::new(&self.name, to, kind, priority, payload, ttl);
        if let Err(e) = self.bus.send(&message).await {
            warn!("{}: send to {} failed: {}", self.name, to, e);
        }
    }

    /// Send to the supervisor, decorated with `{source, timestamp}`.
    pub async fn report_to_supervisor(
        &self,
        kind: MessageType,
        priority: MessagePriority,
        payload: serde_json::Value,
    ) {
        let mut decorated = payload;
        if let Some(map) = decorated.as_object_mut() {
            map.insert("source".to_string(), serde_json::json!(self.name));
            map.insert(
                "timestamp".to_string(),
                serde_json::json!(Utc::now().to_rfc3339()),
            );
        }
        self.send_message(SUPERVISOR, kind, priority, decorated, None)
            .await;
    }

    /// Up to `limit` unacknowledged, unexpired messages addressed to self.
    /// Read failures degrade to an empty batch.
    pub async fn read_messages(&self, limit: u32) -> Vec<Message> {
        match self.bus.read_for(&self.name, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("{}: bus read failed: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// Idempotent acknowledge; failures log at debug.
    pub async fn acknowledge_message(&self, id: Uuid) {
        if let Err(e) = self.bus.acknowledge(id).await {
            debug!("{}: ack {} failed: {}", self.name, id, e);
        }
    }

    pub async fn save_state(&self, state: &serde_json::Value) {
        if let Err(e) = self.kv.save_agent_state(&self.name, state).await {
            warn!("{}: state save failed: {}", self.name, e);
        }
    }

    pub async fn restore_state(&self) -> Option<serde_json::Value> {
        match self.kv.restore_agent_state(&self.name).await {
            Ok(state) => state,
            Err(e) => {
                warn!("{}: state restore failed: {}", self.name, e);
                None
            }
        }
    }

    pub fn bus(&self) -> &MessageRepository {
        &self.bus
    }

    pub fn agent_registry(&self) -> &AgentRepository {
        &self.registry
    }

    pub fn kv(&self) -> &KvRepository {
        &self.kv
    }
}

/// The behavior a worker plugs into the runtime.
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    fn context(&self) -> &Arc<AgentContext>;

    /// Spawn worker-specific intervals here via `add_interval`.
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Handle one bus message. Errors are caught per message; the message is
    /// acknowledged either way.
    async fn handle_message(&self, message: &Message) -> Result<()> {
        debug!(
            "{}: unhandled {} from {}",
            self.context().name(),
            message.kind,
            message.from
        );
        Ok(())
    }
}

/// Bring a worker online: registration, heartbeat, `on_start`, poll loop.
pub async fn start_worker(
    worker: Arc<dyn WorkerAgent>,
    heartbeat_interval_ms: u64,
    poll_interval_ms: u64,
    poll_batch: u32,
) -> Result<()> {
    let ctx = worker.context().clone();
    if !ctx.start().await? {
        return Ok(());
    }
    ctx.clone().start_heartbeat(heartbeat_interval_ms).await;

    if let Err(e) = worker.on_start().await {
        error!("{}: on_start failed: {}", ctx.name(), e);
    }

    let poll_worker = Arc::clone(&worker);
    let poll_ctx = Arc::clone(&ctx);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(poll_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            drain_batch(&poll_worker, &poll_ctx, poll_batch).await;
        }
    });
    ctx.register_task(handle).await;

    Ok(())
}

/// Drain one poll batch: handler, then ack, in bus order. A failing handler
/// does not block the rest of the batch and its message is still acked.
pub async fn drain_batch(worker: &Arc<dyn WorkerAgent>, ctx: &Arc<AgentContext>, limit: u32) {
    for message in ctx.read_messages(limit).await {
        if let Err(e) = worker.handle_message(&message).await {
            warn!(
                "{}: handler for ({}, {}) failed: {}",
                ctx.name(),
                message.from,
                message.kind,
                e
            );
        }
        ctx.acknowledge_message(message.id).await;
    }
}

/// Take a worker offline: cancel intervals, terminal heartbeat, `on_stop`.
pub async fn stop_worker(worker: &Arc<dyn WorkerAgent>) {
    let ctx = worker.context();
    ctx.stop().await;
    if let Err(e) = worker.on_stop().await {
        warn!("{}: on_stop failed: {}", ctx.name(), e);
    }
}
