//! Default supervisor handler set.

use super::{Destination, Supervisor};
use crate::application::runtime::agent::WorkerAgent;
use crate::application::runtime::CFO;
use crate::domain::fingerprint::topic_fingerprint;
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::domain::payloads::{
    CommunityReport, DefiSnapshot, HealthCommand, LauncherEvent, NarrativeShift,
    PriceAlertPayload, SafetyAlert, VolumeSpikePayload,
};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

/// Alert keywords that route a high-severity guardian alert to the engine.
const ESCALATION_KEYWORDS: &[&str] = &["drain", "crash", "exploit", "rug", "depeg"];

impl Supervisor {
    pub(crate) async fn handle_narrative(&self, message: &Message) -> Result<()> {
        let narrative: NarrativeShift = serde_json::from_value(message.payload.clone())?;
        if narrative.summary.is_empty() {
            debug!("nova-supervisor: empty narrative from scout, skipping");
            return Ok(());
        }

        let now = Utc::now();
        let cooldown = ChronoDuration::hours(self.swarm_config().narrative_cooldown_hours);
        let fingerprint = topic_fingerprint(&narrative.summary);

        {
            let state = self.state.lock().await;
            if let Some(last) = state.last_narrative_post_at
                && now - last < cooldown
            {
                debug!(
                    "nova-supervisor: narrative cooldown active ({}h), skipping '{}'",
                    self.swarm_config().narrative_cooldown_hours,
                    narrative.summary
                );
                return Ok(());
            }
            if state.fingerprints.contains(&fingerprint) {
                debug!(
                    "nova-supervisor: duplicate topic {}, skipping '{}'",
                    fingerprint, narrative.summary
                );
                return Ok(());
            }
        }

        let posted = self.gate().publish_narrative(&narrative.summary).await;
        if posted {
            let mut state = self.state.lock().await;
            state.fingerprints.insert(&fingerprint);
            state.last_narrative_post_at = Some(now);
            state.dirty = true;
            drop(state);
            self.save_state().await;
            info!("nova-supervisor: published narrative '{}'", narrative.summary);
        }
        Ok(())
    }

    pub(crate) async fn handle_safety_alert(&self, message: &Message) -> Result<()> {
        let alert: SafetyAlert = serde_json::from_value(message.payload.clone())?;

        // Category steers rendering; no category falls back to the generic
        // warning banner.
        let banner = match alert.category.as_deref() {
            Some("market_crash") => "🚨 MARKET CRASH",
            Some("lp_drain") => "🚨 LP DRAIN",
            Some(other) => {
                debug!("nova-supervisor: alert category '{}'", other);
                "⚠️ ALERT"
            }
            None => "⚠️ ALERT",
        };
        let rendered = format!("{}: {}", banner, alert.description);

        match alert.severity.as_str() {
            "critical" => {
                self.gate().publish(Destination::X, &rendered).await;
                self.gate().publish(Destination::Channel, &rendered).await;
                self.gate().publish(Destination::Farcaster, &rendered).await;
                self.gate().publish(Destination::Admin, &rendered).await;

                self.context()
                    .send_message(
                        CFO,
                        MessageType::Command,
                        MessagePriority::Critical,
                        serde_json::json!({
                            "command": "market_crash",
                            "token": alert.token,
                            "description": alert.description,
                        }),
                        None,
                    )
                    .await;
            }
            "high" => {
                let lower = alert.description.to_lowercase();
                if ESCALATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    self.context()
                        .send_message(
                            CFO,
                            MessageType::Alert,
                            MessagePriority::High,
                            message.payload.clone(),
                            Some(ChronoDuration::hours(4)),
                        )
                        .await;
                } else {
                    debug!("nova-supervisor: high alert without escalation keyword");
                }
            }
            _ => {
                debug!("nova-supervisor: {} alert logged: {}", alert.severity, alert.description);
            }
        }
        Ok(())
    }

    pub(crate) async fn handle_analyst_intel(&self, message: &Message) -> Result<()> {
        let intel_type = message
            .payload
            .get("intel_type")
            .and_then(|t| t.as_str())
            .unwrap_or_default();

        match intel_type {
            "price_alert" => {
                let alert: PriceAlertPayload = serde_json::from_value(message.payload.clone())?;
                let arrow = if alert.change_24h_pct >= 0.0 { "📈" } else { "📉" };
                self.gate()
                    .publish(
                        Destination::Channel,
                        &format!(
                            "{} {} ${:.2} ({:+.1}% 24h)",
                            arrow, alert.symbol, alert.price_usd, alert.change_24h_pct
                        ),
                    )
                    .await;
            }
            "volume_spike" => {
                let spike: VolumeSpikePayload = serde_json::from_value(message.payload.clone())?;
                self.gate()
                    .publish(
                        Destination::Channel,
                        &format!("🔊 Volume spike on {} ({:.1}x)", spike.symbol, spike.multiple),
                    )
                    .await;
            }
            "defi_snapshot" => {
                let snapshot: DefiSnapshot = serde_json::from_value(message.payload.clone())?;
                if let Some(summary) = &snapshot.summary {
                    self.gate()
                        .publish(Destination::Channel, &format!("📊 {}", summary))
                        .await;
                }
            }
            other => {
                debug!("nova-supervisor: unknown analyst intel '{}'", other);
                return Ok(());
            }
        }

        // Structured forward for the decision engine.
        self.context()
            .send_message(
                CFO,
                MessageType::Intel,
                message.priority,
                message.payload.clone(),
                Some(ChronoDuration::hours(4)),
            )
            .await;
        Ok(())
    }

    pub(crate) async fn handle_launcher_event(&self, message: &Message) -> Result<()> {
        let event: LauncherEvent = serde_json::from_value(message.payload.clone())?;
        let symbol = event.symbol.clone().unwrap_or_else(|| event.mint.clone());

        match event.event.as_str() {
            "launched" => {
                self.gate()
                    .publish(
                        Destination::Channel,
                        &format!("🚀 {} launched (mint {})", symbol, event.mint),
                    )
                    .await;
                self.spawn_child(&event.mint, &symbol).await?;
            }
            "graduated" => {
                self.gate()
                    .publish(
                        Destination::Channel,
                        &format!("🎓 {} graduated to open trading", symbol),
                    )
                    .await;
                self.spawn_child(&event.mint, &symbol).await?;
            }
            other => debug!("nova-supervisor: unknown launcher event '{}'", other),
        }
        Ok(())
    }

    pub(crate) async fn handle_community_report(&self, message: &Message) -> Result<()> {
        let report: CommunityReport = serde_json::from_value(message.payload.clone())?;
        match report.kind.as_str() {
            "engagement_spike" if message.priority <= MessagePriority::High => {
                let summary = report
                    .summary
                    .unwrap_or_else(|| format!("{} interactions", report.count));
                self.gate()
                    .publish(Destination::Channel, &format!("🔥 {}", summary))
                    .await;
            }
            "ban_burst" => {
                self.gate()
                    .publish(
                        Destination::Channel,
                        &format!(
                            "🛡️ Moderation: {} bans in the last {}min, raid protection active",
                            report.count, report.window_minutes
                        ),
                    )
                    .await;
            }
            other => debug!("nova-supervisor: community report '{}' logged", other),
        }
        Ok(())
    }

    pub(crate) async fn handle_health_command(&self, message: &Message) -> Result<()> {
        let command: HealthCommand = serde_json::from_value(message.payload.clone())?;
        if command.command != "deactivate_child" {
            debug!("nova-supervisor: unknown health command '{}'", command.command);
            return Ok(());
        }
        let Some(agent_name) = command.agent_name else {
            warn!("nova-supervisor: deactivate_child without agent_name");
            return Ok(());
        };
        match self.child_mint_by_agent_name(&agent_name).await {
            Some(mint) => {
                self.deactivate_child(&mint).await;
            }
            None => debug!("nova-supervisor: no child registered as {}", agent_name),
        }
        Ok(())
    }

    pub(crate) async fn handle_health_status(&self, message: &Message) -> Result<()> {
        let dead = message
            .payload
            .get("dead")
            .and_then(|d| d.as_array())
            .map(|d| d.len())
            .unwrap_or(0);
        if dead > 0
            && let Some(summary) = message.payload.get("summary").and_then(|s| s.as_str())
        {
            self.gate()
                .publish(Destination::Admin, &format!("🩺 {}", summary))
                .await;
        }
        Ok(())
    }

    pub(crate) async fn handle_child_status(&self, message: &Message) -> Result<()> {
        debug!(
            "nova-supervisor: child status from {}: {}",
            message.from, message.payload
        );
        Ok(())
    }

    pub(crate) async fn handle_cfo_report(&self, message: &Message) -> Result<()> {
        if let Some(summary) = message.payload.get("summary").and_then(|s| s.as_str()) {
            self.gate().publish(Destination::Admin, summary).await;
        }
        Ok(())
    }
}
