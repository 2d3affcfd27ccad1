//! Typed payload contracts per `(sender, kind)` pair.
//!
//! The bus itself is schemaless; these structs are deserialized at each
//! handler boundary. Every field that a peer might omit is optional or
//! defaulted so an unknown shape degrades to a logged skip, never a failed
//! batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoration added by `report_to_supervisor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

/// Scout narrative intel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrativeShift {
    #[serde(default)]
    pub intel_type: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub crypto_bullish: Option<bool>,
    #[serde(default)]
    pub narratives: Vec<String>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

/// Guardian safety alert. `category` steers the rendering; an absent
/// category uses the generic warning formatter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Analyst DeFi snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefiSnapshot {
    #[serde(default)]
    pub intel_type: Option<String>,
    #[serde(default)]
    pub tvl_usd: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub top_pools: Vec<String>,
}

/// Analyst price alert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceAlertPayload {
    pub symbol: String,
    pub price_usd: f64,
    #[serde(default)]
    pub change_24h_pct: f64,
}

/// Analyst volume spike.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeSpikePayload {
    pub symbol: String,
    pub multiple: f64,
    #[serde(default)]
    pub window_minutes: u32,
}

/// Analyst token table (prices, movers, trending).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenTablePayload {
    #[serde(default)]
    pub tokens: Vec<TokenRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRow {
    pub symbol: String,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub change_24h_pct: Option<f64>,
    #[serde(default)]
    pub trending: bool,
}

/// Launcher lifecycle event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherEvent {
    pub event: String,
    pub mint: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Community engagement / moderation report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityReport {
    pub kind: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub window_minutes: u32,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Health-monitor command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCommand {
    pub command: String,
    #[serde(default)]
    pub agent_name: Option<String>,
}

/// Admin command routed to the CFO.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfoCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Periodic status from a token child.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenChildStatus {
    pub mint: String,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub holders: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}
