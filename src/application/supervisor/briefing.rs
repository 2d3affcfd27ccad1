//! Periodic swarm briefing.
//!
//! Folds the recent intel window, active-agent set and whatever live stats
//! are available into two renderings: a detailed admin digest and a short
//! community update. Missing stats are tolerated, never an error.

use crate::domain::fingerprint::normalized_prefix;
use crate::domain::message::{Heartbeat, Message, MessagePriority};
use std::collections::{BTreeMap, HashSet};

/// Prefix length used to collapse near-identical intel lines.
const DEDUP_PREFIX_CHARS: usize = 100;

/// Live stats folded into the briefing when present.
#[derive(Debug, Clone, Default)]
pub struct BriefingStats {
    pub trends_pool: Option<String>,
    pub pnl_summary: Option<String>,
    pub metrics_summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BriefingOutput {
    pub admin: String,
    pub community: String,
    pub key_intel_count: usize,
    pub routine_count: usize,
}

/// Human-readable one-liner for a bus message.
fn message_line(message: &Message) -> String {
    let payload = &message.payload;
    let text = payload
        .get("summary")
        .or_else(|| payload.get("description"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{} from {}", message.kind, message.from));
    format!("[{}] {}", message.from.trim_start_matches("nova-"), text)
}

pub fn build_briefing(
    active_agents: &[Heartbeat],
    recent: &[Message],
    stats: &BriefingStats,
    messages_processed: u64,
) -> BriefingOutput {
    // Bucket by sender, newest last; collapse near-duplicates.
    let mut seen_prefixes: HashSet<String> = HashSet::new();
    let mut key_intel: Vec<String> = Vec::new();
    let mut routine_by_agent: BTreeMap<String, usize> = BTreeMap::new();

    for message in recent {
        let line = message_line(message);
        let prefix = normalized_prefix(&line, DEDUP_PREFIX_CHARS);
        if !seen_prefixes.insert(prefix) {
            continue;
        }
        match message.priority {
            MessagePriority::Critical | MessagePriority::High => key_intel.push(line),
            MessagePriority::Medium | MessagePriority::Low => {
                *routine_by_agent.entry(message.from.clone()).or_insert(0) += 1;
            }
        }
    }

    let routine_count: usize = routine_by_agent.values().sum();
    let active_names: Vec<&str> = active_agents
        .iter()
        .map(|hb| hb.name.trim_start_matches("nova-"))
        .collect();

    // Admin rendering: everything.
    let mut admin = String::new();
    admin.push_str("🧠 Swarm Briefing\n");
    admin.push_str(&format!(
        "Active agents ({}): {}\n",
        active_names.len(),
        if active_names.is_empty() {
            "none".to_string()
        } else {
            active_names.join(", ")
        }
    ));
    admin.push_str(&format!("Messages this window: {}\n", messages_processed));

    if !key_intel.is_empty() {
        admin.push_str("\nKey Intel:\n");
        for line in &key_intel {
            admin.push_str(&format!("  • {}\n", line));
        }
    }
    if routine_count > 0 {
        admin.push_str(&format!("\n{} routine updates processed", routine_count));
        let detail: Vec<String> = routine_by_agent
            .iter()
            .map(|(agent, n)| format!("{} {}", n, agent.trim_start_matches("nova-")))
            .collect();
        admin.push_str(&format!(" ({})\n", detail.join(", ")));
    }

    if let Some(trends) = &stats.trends_pool {
        admin.push_str(&format!("\nTrending pool: {}\n", trends));
    }
    if let Some(pnl) = &stats.pnl_summary {
        admin.push_str(&format!("PnL: {}\n", pnl));
    }
    if let Some(metrics) = &stats.metrics_summary {
        admin.push_str(&format!("Metrics: {}\n", metrics));
    }

    // Community rendering: short and friendly, no internals.
    let mut community = String::new();
    community.push_str("📡 Nova swarm update\n");
    community.push_str(&format!(
        "{} agents on duty, {} signals processed.\n",
        active_names.len(),
        messages_processed
    ));
    if key_intel.is_empty() {
        community.push_str("All quiet, treasury on autopilot.\n");
    } else {
        community.push_str(&format!("{} notable events:\n", key_intel.len()));
        for line in key_intel.iter().take(3) {
            community.push_str(&format!("  • {}\n", line));
        }
    }
    if let Some(pnl) = &stats.pnl_summary {
        community.push_str(&format!("Performance: {}\n", pnl));
    }

    BriefingOutput {
        admin,
        community,
        key_intel_count: key_intel.len(),
        routine_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{HeartbeatStatus, MessageType};
    use chrono::Utc;

    fn msg(from: &str, priority: MessagePriority, summary: &str) -> Message {
        Message::new(
            from,
            "nova-supervisor",
            MessageType::Intel,
            priority,
            serde_json::json!({"summary": summary}),
            None,
        )
    }

    fn alive(name: &str) -> Heartbeat {
        Heartbeat {
            name: name.to_string(),
            status: HeartbeatStatus::Alive,
            current_task: None,
            last_beat: Utc::now(),
        }
    }

    #[test]
    fn test_critical_listed_and_routine_summarised() {
        let mut recent = Vec::new();
        for i in 0..10 {
            recent.push(msg(
                "nova-scout",
                MessagePriority::Low,
                &format!("routine scan {}", i),
            ));
        }
        recent.push(msg(
            "nova-guardian",
            MessagePriority::Critical,
            "LP drain on pool alpha",
        ));
        recent.push(msg(
            "nova-guardian",
            MessagePriority::Critical,
            "oracle deviation on SOL feed",
        ));

        let agents = vec![alive("nova-scout"), alive("nova-guardian")];
        let briefing = build_briefing(&agents, &recent, &BriefingStats::default(), 12);

        assert_eq!(briefing.key_intel_count, 2);
        assert!(briefing.admin.contains("Key Intel"));
        assert!(briefing.admin.contains("LP drain on pool alpha"));
        assert!(briefing.admin.contains("oracle deviation on SOL feed"));
        assert!(briefing.admin.contains("10 routine updates processed"));
    }

    #[test]
    fn test_near_duplicate_intel_collapsed() {
        let recent = vec![
            msg("nova-scout", MessagePriority::High, "Jito restaking yields climbing"),
            msg("nova-scout", MessagePriority::High, "Jito restaking yields climbing!"),
        ];
        let briefing = build_briefing(&[], &recent, &BriefingStats::default(), 2);
        assert_eq!(briefing.key_intel_count, 1);
    }

    #[test]
    fn test_missing_stats_tolerated() {
        let briefing = build_briefing(&[], &[], &BriefingStats::default(), 0);
        assert!(!briefing.admin.contains("PnL:"));
        assert!(briefing.community.contains("All quiet"));
    }

    #[test]
    fn test_stats_folded_in_when_present() {
        let stats = BriefingStats {
            trends_pool: Some("SOL/USDC 0.3%".to_string()),
            pnl_summary: Some("+$124 this week".to_string()),
            metrics_summary: None,
        };
        let briefing = build_briefing(&[], &[], &stats, 0);
        assert!(briefing.admin.contains("SOL/USDC 0.3%"));
        assert!(briefing.admin.contains("+$124 this week"));
        assert!(briefing.community.contains("+$124 this week"));
    }
}
