//! Bus envelope and agent registry types.
//!
//! A `Message` is one durable row on the swarm bus. The payload is a
//! schemaless JSON value; its schema is a by-convention contract between a
//! `(from, kind)` pair and the receiving handler (see `domain::payloads`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The seven message kinds carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Intel,
    Alert,
    Report,
    Request,
    Command,
    Status,
    Heartbeat,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Intel => "intel",
            MessageType::Alert => "alert",
            MessageType::Report => "report",
            MessageType::Request => "request",
            MessageType::Command => "command",
            MessageType::Status => "status",
            MessageType::Heartbeat => "heartbeat",
        }
    }
}

impl FromStr for MessageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intel" => Ok(MessageType::Intel),
            "alert" => Ok(MessageType::Alert),
            "report" => Ok(MessageType::Report),
            "request" => Ok(MessageType::Request),
            "command" => Ok(MessageType::Command),
            "status" => Ok(MessageType::Status),
            "heartbeat" => Ok(MessageType::Heartbeat),
            _ => anyhow::bail!("Unknown message type: {}", s),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority. The total order for delivery is
/// critical < high < medium < low (critical drains first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Critical,
    High,
    Medium,
    Low,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Critical => "critical",
            MessagePriority::High => "high",
            MessagePriority::Medium => "medium",
            MessagePriority::Low => "low",
        }
    }
}

impl FromStr for MessagePriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(MessagePriority::Critical),
            "high" => Ok(MessagePriority::High),
            "medium" => Ok(MessagePriority::Medium),
            "low" => Ok(MessagePriority::Low),
            _ => anyhow::bail!("Unknown message priority: {}", s),
        }
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One durable bus record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub kind: MessageType,
    pub priority: MessagePriority,
    pub payload: serde_json::Value,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        from: &str,
        to: &str,
        kind: MessageType,
        priority: MessagePriority,
        payload: serde_json::Value,
        ttl: Option<chrono::Duration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            from: from.to_string(),
            to: to.to_string(),
            kind,
            priority,
            payload,
            acknowledged: false,
            acknowledged_at: None,
            expires_at: ttl.map(|d| now + d),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at < now)
    }
}

/// Agent registry row, unique by name; upserted on every (re)start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub config: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// The four heartbeat statuses persisted to the registry. Task-level labels
/// (`analyzing`, `scanning`, ...) live in `Heartbeat::current_task` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    Alive,
    Degraded,
    Dead,
    Disabled,
}

impl HeartbeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeartbeatStatus::Alive => "alive",
            HeartbeatStatus::Degraded => "degraded",
            HeartbeatStatus::Dead => "dead",
            HeartbeatStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for HeartbeatStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(HeartbeatStatus::Alive),
            "degraded" => Ok(HeartbeatStatus::Degraded),
            "dead" => Ok(HeartbeatStatus::Dead),
            "disabled" => Ok(HeartbeatStatus::Disabled),
            _ => anyhow::bail!("Unknown heartbeat status: {}", s),
        }
    }
}

/// One heartbeat row per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub name: String,
    pub status: HeartbeatStatus,
    pub current_task: Option<String>,
    pub last_beat: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_delivery_order() {
        // Critical drains before High, High before Medium, Medium before Low;
        // the bus query's CASE expression mirrors this total order
        assert!(MessagePriority::Critical < MessagePriority::High);
        assert!(MessagePriority::High < MessagePriority::Medium);
        assert!(MessagePriority::Medium < MessagePriority::Low);
    }

    #[test]
    fn test_type_round_trip() {
        for kind in [
            MessageType::Intel,
            MessageType::Alert,
            MessageType::Report,
            MessageType::Request,
            MessageType::Command,
            MessageType::Status,
            MessageType::Heartbeat,
        ] {
            assert_eq!(kind.as_str().parse::<MessageType>().unwrap(), kind);
        }
        assert!("telegram".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_expiry() {
        let msg = Message::new(
            "nova-scout",
            "nova-supervisor",
            MessageType::Intel,
            MessagePriority::Medium,
            serde_json::json!({"summary": "quiet day"}),
            Some(chrono::Duration::hours(1)),
        );
        let now = Utc::now();
        assert!(!msg.is_expired(now));
        assert!(msg.is_expired(now + chrono::Duration::hours(2)));

        let no_ttl = Message::new(
            "nova-scout",
            "nova-supervisor",
            MessageType::Intel,
            MessagePriority::Low,
            serde_json::Value::Null,
            None,
        );
        assert!(!no_ttl.is_expired(now + chrono::Duration::days(365)));
    }

    #[test]
    fn test_heartbeat_status_parse() {
        assert_eq!(
            "degraded".parse::<HeartbeatStatus>().unwrap(),
            HeartbeatStatus::Degraded
        );
        // Task-level labels are not valid statuses
        assert!("analyzing".parse::<HeartbeatStatus>().is_err());
    }
}
