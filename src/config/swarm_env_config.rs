//! Swarm runtime configuration parsing from environment variables.
//!
//! This module handles bus polling, heartbeats, briefing cadence, narrative
//! publication gating and bus garbage collection.

use anyhow::{Context, Result};
use std::env;

/// Swarm runtime environment configuration
#[derive(Debug, Clone)]
pub struct SwarmEnvConfig {
    /// Supervisor and worker bus poll interval.
    pub poll_interval_ms: u64,
    /// Messages drained per poll.
    pub poll_batch_size: u32,
    pub heartbeat_interval_ms: u64,
    /// Heartbeats older than this are considered degraded.
    pub heartbeat_degraded_after_ms: u64,
    /// Heartbeats older than this are considered dead.
    pub heartbeat_dead_after_ms: u64,

    // Briefing
    pub briefing_interval_hours: u64,

    // Narrative publication gating
    pub narrative_cooldown_hours: i64,
    /// Fingerprint history cap; oldest evicted on overflow.
    pub max_x_post_history: usize,
    pub x_char_limit: usize,
    pub farcaster_channel: String,

    // Scout feed
    pub scout_feed_url: String,
    pub scout_poll_interval_secs: u64,

    // Bus garbage collection
    pub cleanup_interval_hours: u64,
    pub audit_retention_days: i64,

    // Community moderation
    pub ban_burst_threshold: u32,
    pub ban_burst_window_minutes: u32,
}

impl SwarmEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_ms: Self::parse_u64("POLL_INTERVAL_MS", 5000)?,
            poll_batch_size: Self::parse_u32("POLL_BATCH_SIZE", 10)?,
            heartbeat_interval_ms: Self::parse_u64("HEARTBEAT_INTERVAL_MS", 30_000)?,
            heartbeat_degraded_after_ms: Self::parse_u64("HEARTBEAT_DEGRADED_AFTER_MS", 120_000)?,
            heartbeat_dead_after_ms: Self::parse_u64("HEARTBEAT_DEAD_AFTER_MS", 600_000)?,
            briefing_interval_hours: Self::parse_u64("BRIEFING_INTERVAL", 4)?,
            narrative_cooldown_hours: Self::parse_i64("NARRATIVE_COOLDOWN_HOURS", 6)?,
            max_x_post_history: Self::parse_usize("MAX_X_POST_HISTORY", 20)?,
            x_char_limit: Self::parse_usize("X_CHAR_LIMIT", 280)?,
            farcaster_channel: env::var("FARCASTER_CHANNEL")
                .unwrap_or_else(|_| "solana".to_string()),
            scout_feed_url: env::var("SCOUT_FEED_URL").unwrap_or_default(),
            scout_poll_interval_secs: Self::parse_u64("SCOUT_POLL_INTERVAL_SECONDS", 900)?,
            cleanup_interval_hours: Self::parse_u64("CLEANUP_INTERVAL_HOURS", 6)?,
            audit_retention_days: Self::parse_i64("AUDIT_RETENTION_DAYS", 7)?,
            ban_burst_threshold: Self::parse_u32("BAN_BURST_THRESHOLD", 3)?,
            ban_burst_window_minutes: Self::parse_u32("BAN_BURST_WINDOW_MINUTES", 30)?,
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u32>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<i64>()
            .context(format!("Failed to parse {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swarm_config_defaults() {
        let config = SwarmEnvConfig::from_env().expect("Should parse with defaults");
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.poll_batch_size, 10);
        assert_eq!(config.briefing_interval_hours, 4);
        assert_eq!(config.narrative_cooldown_hours, 6);
        assert_eq!(config.max_x_post_history, 20);
        assert_eq!(config.audit_retention_days, 7);
    }
}
