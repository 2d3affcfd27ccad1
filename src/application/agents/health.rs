//! Health monitor: heartbeat staleness sweep.
//!
//! Derives an effective status for every agent from heartbeat age (each
//! agent owns its own row, so the monitor never writes another agent's
//! heartbeat). Dead token children get a `deactivate_child` command to the
//! supervisor.

use crate::application::runtime::{AgentContext, SUPERVISOR, WorkerAgent};
use crate::domain::message::{Heartbeat, HeartbeatStatus, MessagePriority, MessageType};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Agent names carrying this prefix are supervisor-spawned token children.
pub const TOKEN_CHILD_PREFIX: &str = "nova-token-";

pub struct HealthAgent {
    ctx: Arc<AgentContext>,
    sweep_interval: Duration,
    degraded_after_ms: u64,
    dead_after_ms: u64,
}

impl HealthAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        sweep_interval: Duration,
        degraded_after_ms: u64,
        dead_after_ms: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            sweep_interval,
            degraded_after_ms,
            dead_after_ms,
        })
    }

    /// Effective status by heartbeat age; `disabled` rows stay disabled.
    fn effective_status(
        heartbeat: &Heartbeat,
        now: DateTime<Utc>,
        degraded_after_ms: u64,
        dead_after_ms: u64,
    ) -> HeartbeatStatus {
        if heartbeat.status == HeartbeatStatus::Disabled {
            return HeartbeatStatus::Disabled;
        }
        let age_ms = (now - heartbeat.last_beat).num_milliseconds().max(0) as u64;
        if age_ms >= dead_after_ms {
            HeartbeatStatus::Dead
        } else if age_ms >= degraded_after_ms {
            HeartbeatStatus::Degraded
        } else {
            heartbeat.status
        }
    }

    async fn sweep(
        ctx: &Arc<AgentContext>,
        degraded_after_ms: u64,
        dead_after_ms: u64,
    ) {
        let heartbeats = match ctx.agent_registry().list_heartbeats().await {
            Ok(heartbeats) => heartbeats,
            Err(e) => {
                warn!("nova-health: heartbeat read failed: {}", e);
                return;
            }
        };

        let now = Utc::now();
        let mut degraded = Vec::new();
        let mut dead = Vec::new();

        for heartbeat in &heartbeats {
            match Self::effective_status(heartbeat, now, degraded_after_ms, dead_after_ms) {
                HeartbeatStatus::Degraded => degraded.push(heartbeat.name.clone()),
                HeartbeatStatus::Dead => dead.push(heartbeat.name.clone()),
                _ => {}
            }
        }

        for name in &dead {
            if name.starts_with(TOKEN_CHILD_PREFIX) {
                info!("nova-health: child {} is dead, requesting teardown", name);
                ctx.send_message(
                    SUPERVISOR,
                    MessageType::Command,
                    MessagePriority::High,
                    serde_json::json!({
                        "command": "deactivate_child",
                        "agent_name": name,
                    }),
                    None,
                )
                .await;
            }
        }

        if !degraded.is_empty() || !dead.is_empty() {
            ctx.report_to_supervisor(
                MessageType::Status,
                if dead.is_empty() {
                    MessagePriority::Medium
                } else {
                    MessagePriority::High
                },
                serde_json::json!({
                    "degraded": degraded,
                    "dead": dead,
                    "summary": format!(
                        "{} degraded, {} dead of {} agents",
                        degraded.len(),
                        dead.len(),
                        heartbeats.len()
                    ),
                }),
            )
            .await;
        }
    }
}

#[async_trait]
impl WorkerAgent for HealthAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let degraded_after_ms = self.degraded_after_ms;
        let dead_after_ms = self.dead_after_ms;
        self.ctx
            .add_interval(self.sweep_interval, "health-sweep", move || {
                let ctx = Arc::clone(&ctx);
                async move {
                    HealthAgent::sweep(&ctx, degraded_after_ms, dead_after_ms).await;
                }
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn heartbeat(status: HeartbeatStatus, age_secs: i64) -> Heartbeat {
        Heartbeat {
            name: "nova-scout".to_string(),
            status,
            current_task: None,
            last_beat: Utc::now() - ChronoDuration::seconds(age_secs),
        }
    }

    #[test]
    fn test_fresh_heartbeat_keeps_status() {
        let hb = heartbeat(HeartbeatStatus::Alive, 10);
        assert_eq!(
            HealthAgent::effective_status(&hb, Utc::now(), 120_000, 600_000),
            HeartbeatStatus::Alive
        );
    }

    #[test]
    fn test_stale_heartbeat_degrades_then_dies() {
        let degraded = heartbeat(HeartbeatStatus::Alive, 180);
        assert_eq!(
            HealthAgent::effective_status(&degraded, Utc::now(), 120_000, 600_000),
            HeartbeatStatus::Degraded
        );
        let dead = heartbeat(HeartbeatStatus::Alive, 700);
        assert_eq!(
            HealthAgent::effective_status(&dead, Utc::now(), 120_000, 600_000),
            HeartbeatStatus::Dead
        );
    }

    #[test]
    fn test_disabled_stays_disabled() {
        let hb = heartbeat(HeartbeatStatus::Disabled, 10_000);
        assert_eq!(
            HealthAgent::effective_status(&hb, Utc::now(), 120_000, 600_000),
            HeartbeatStatus::Disabled
        );
    }
}
