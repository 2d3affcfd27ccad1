//! Periodic bus garbage collection.
//!
//! Every few hours: reclaim acknowledged messages past the audit window,
//! expired messages, heartbeats of stopped agents, and audit-prefixed KV
//! rows past retention. Failures are logged and retried next round.

use crate::infrastructure::persistence::agent_repository::AgentRepository;
use crate::infrastructure::persistence::kv_repository::{AUDIT_PREFIX, KvRepository};
use crate::infrastructure::persistence::message_repository::MessageRepository;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

pub struct CleanupTask {
    messages: MessageRepository,
    agents: AgentRepository,
    kv: KvRepository,
    interval_hours: u64,
    audit_retention_days: i64,
}

impl CleanupTask {
    pub fn new(
        messages: MessageRepository,
        agents: AgentRepository,
        kv: KvRepository,
        interval_hours: u64,
        audit_retention_days: i64,
    ) -> Self {
        Self {
            messages,
            agents,
            kv,
            interval_hours,
            audit_retention_days,
        }
    }

    pub async fn run(self) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.interval_hours * 3600));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a restart loop does
        // not hammer the table.
        ticker.tick().await;

        info!(
            "CleanupTask: running every {}h, audit window {}d",
            self.interval_hours, self.audit_retention_days
        );

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    pub async fn sweep(&self) {
        let now = Utc::now();
        let audit_cutoff = now - Duration::days(self.audit_retention_days);

        match self.messages.delete_acknowledged_before(audit_cutoff).await {
            Ok(n) if n > 0 => info!("CleanupTask: reclaimed {} acknowledged messages", n),
            Ok(_) => debug!("CleanupTask: no acknowledged messages to reclaim"),
            Err(e) => warn!("CleanupTask: acknowledged sweep failed: {}", e),
        }

        match self.messages.delete_expired(now).await {
            Ok(n) if n > 0 => info!("CleanupTask: reclaimed {} expired messages", n),
            Ok(_) => {}
            Err(e) => warn!("CleanupTask: expired sweep failed: {}", e),
        }

        match self.agents.delete_disabled_before(audit_cutoff).await {
            Ok(n) if n > 0 => info!("CleanupTask: reclaimed {} stopped heartbeats", n),
            Ok(_) => {}
            Err(e) => warn!("CleanupTask: heartbeat sweep failed: {}", e),
        }

        match self.kv.delete_prefix_before(AUDIT_PREFIX, audit_cutoff).await {
            Ok(n) if n > 0 => info!("CleanupTask: reclaimed {} audit KV rows", n),
            Ok(_) => {}
            Err(e) => warn!("CleanupTask: KV sweep failed: {}", e),
        }
    }
}
