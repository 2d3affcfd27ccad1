//! Community: engagement and moderation telemetry.
//!
//! Social events arrive as bus commands from the chat ingest; the agent
//! windows them in memory and reports spikes and ban bursts upward.

use crate::application::runtime::{AgentContext, WorkerAgent};
use crate::domain::message::{Message, MessagePriority, MessageType};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Engagement events in the window before a spike is reported.
const ENGAGEMENT_SPIKE_THRESHOLD: usize = 50;

const ENGAGEMENT_WINDOW_MINUTES: i64 = 60;

#[derive(Default)]
struct EventWindows {
    engagement: VecDeque<DateTime<Utc>>,
    bans: VecDeque<DateTime<Utc>>,
}

impl EventWindows {
    fn prune(&mut self, now: DateTime<Utc>, ban_window_minutes: i64) {
        let engagement_cutoff = now - ChronoDuration::minutes(ENGAGEMENT_WINDOW_MINUTES);
        while self
            .engagement
            .front()
            .map(|t| *t < engagement_cutoff)
            .unwrap_or(false)
        {
            self.engagement.pop_front();
        }
        let ban_cutoff = now - ChronoDuration::minutes(ban_window_minutes);
        while self.bans.front().map(|t| *t < ban_cutoff).unwrap_or(false) {
            self.bans.pop_front();
        }
    }
}

pub struct CommunityAgent {
    ctx: Arc<AgentContext>,
    windows: Arc<Mutex<EventWindows>>,
    report_interval: Duration,
    ban_burst_threshold: u32,
    ban_burst_window_minutes: u32,
}

impl CommunityAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        report_interval: Duration,
        ban_burst_threshold: u32,
        ban_burst_window_minutes: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            windows: Arc::new(Mutex::new(EventWindows::default())),
            report_interval,
            ban_burst_threshold,
            ban_burst_window_minutes,
        })
    }

    async fn evaluate(
        ctx: &Arc<AgentContext>,
        windows: &Arc<Mutex<EventWindows>>,
        ban_burst_threshold: u32,
        ban_burst_window_minutes: u32,
    ) {
        let now = Utc::now();
        let (engagement_count, ban_count) = {
            let mut windows = windows.lock().await;
            windows.prune(now, ban_burst_window_minutes as i64);
            (windows.engagement.len(), windows.bans.len())
        };

        if engagement_count >= ENGAGEMENT_SPIKE_THRESHOLD {
            info!(
                "nova-community: engagement spike, {} events in {}min",
                engagement_count, ENGAGEMENT_WINDOW_MINUTES
            );
            ctx.report_to_supervisor(
                MessageType::Report,
                MessagePriority::High,
                serde_json::json!({
                    "kind": "engagement_spike",
                    "count": engagement_count,
                    "window_minutes": ENGAGEMENT_WINDOW_MINUTES,
                    "summary": format!(
                        "{} community interactions in the last hour",
                        engagement_count
                    ),
                }),
            )
            .await;
        }

        if ban_count > ban_burst_threshold as usize {
            ctx.report_to_supervisor(
                MessageType::Report,
                MessagePriority::High,
                serde_json::json!({
                    "kind": "ban_burst",
                    "count": ban_count,
                    "window_minutes": ban_burst_window_minutes,
                    "summary": format!(
                        "{} bans in {}min, raid likely",
                        ban_count, ban_burst_window_minutes
                    ),
                }),
            )
            .await;
        }
    }
}

#[async_trait]
impl WorkerAgent for CommunityAgent {
    fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    async fn on_start(&self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let windows = Arc::clone(&self.windows);
        let threshold = self.ban_burst_threshold;
        let window_minutes = self.ban_burst_window_minutes;
        self.ctx
            .add_interval(self.report_interval, "community-window", move || {
                let ctx = Arc::clone(&ctx);
                let windows = Arc::clone(&windows);
                async move {
                    CommunityAgent::evaluate(&ctx, &windows, threshold, window_minutes).await;
                }
            })
            .await;
        Ok(())
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        if message.kind != MessageType::Command {
            return Ok(());
        }
        let event = message
            .payload
            .get("event")
            .and_then(|e| e.as_str())
            .unwrap_or_default();
        let mut windows = self.windows.lock().await;
        match event {
            "message" | "reaction" | "join" => windows.engagement.push_back(Utc::now()),
            "ban" => windows.bans.push_back(Utc::now()),
            other => debug!("nova-community: unknown event '{}'", other),
        }
        Ok(())
    }
}
