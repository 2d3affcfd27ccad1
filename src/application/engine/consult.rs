//! Swarm intel consultation.
//!
//! Reads the CFO-addressed bus window, classifies each row by sender and
//! intel type, keeps the freshest entry per category, and derives the risk
//! composite.

use crate::application::runtime::CFO;
use crate::domain::intel::{GuardianAlert, PriceAlert, SwarmIntel, TokenIntel, infer_scout_sentiment};
use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::infrastructure::persistence::MessageRepository;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Intel older than this window is ignored entirely.
pub const INTEL_WINDOW_HOURS: i64 = 4;

fn parse_token_rows(payload: &serde_json::Value) -> Vec<TokenIntel> {
    payload
        .get("tokens")
        .and_then(|t| t.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(TokenIntel {
                        symbol: row.get("symbol")?.as_str()?.to_string(),
                        mint: row.get("mint").and_then(|m| m.as_str()).map(String::from),
                        price_usd: row.get("price_usd").and_then(|p| p.as_f64()),
                        change_24h_pct: row.get("change_24h_pct").and_then(|c| c.as_f64()),
                        trending: row.get("trending").and_then(|t| t.as_bool()).unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fold one bus row into the composite. Public for tests.
pub fn fold_message(intel: &mut SwarmIntel, message: &Message, scout_seen_at: &mut Option<DateTime<Utc>>) {
    intel.mark_fresh(&message.from, message.created_at);

    let payload = &message.payload;
    let intel_type = payload
        .get("intel_type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let command = payload.get("command").and_then(|c| c.as_str());

    // Guardian critical escalation arrives as an alert or a market_crash
    // command regardless of sender path.
    if message.kind == MessageType::Alert || command == Some("market_crash") {
        if message.priority == MessagePriority::Critical || command == Some("market_crash") {
            intel.guardian_critical = true;
        }
        intel.guardian_alerts.push(GuardianAlert {
            severity: payload
                .get("severity")
                .and_then(|s| s.as_str())
                .unwrap_or("high")
                .to_string(),
            description: payload
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or_default()
                .to_string(),
            category: payload
                .get("category")
                .and_then(|c| c.as_str())
                .map(String::from),
            received_at: message.created_at,
        });
        return;
    }

    match intel_type {
        "scout_sentiment" | "narrative_shift" => {
            // Freshest scout reading wins.
            if scout_seen_at.map(|at| message.created_at > at).unwrap_or(true) {
                *scout_seen_at = Some(message.created_at);
                intel.scout_at = Some(message.created_at);
                let explicit = payload.get("crypto_bullish").and_then(|b| b.as_bool());
                let summary = payload
                    .get("summary")
                    .and_then(|s| s.as_str())
                    .unwrap_or_default();
                intel.scout_bullish = explicit.or_else(|| infer_scout_sentiment(summary));
            }
            if let Some(narratives) = payload.get("narratives").and_then(|n| n.as_array()) {
                for narrative in narratives.iter().filter_map(|n| n.as_str()) {
                    if !intel.narratives.iter().any(|existing| existing == narrative) {
                        intel.narratives.push(narrative.to_string());
                    }
                }
            }
        }
        "watchlist_tokens" => {
            intel.watchlist_tokens = parse_token_rows(payload);
        }
        "token_prices" | "token_movers" | "trending_tokens" => {
            for token in parse_token_rows(payload) {
                intel.token_prices.insert(token.symbol.clone(), token);
            }
        }
        "defi_snapshot" => {
            if let Some(tvl) = payload.get("tvl_usd").and_then(|t| t.as_f64()) {
                intel.analyst_tvl_usd = Some(tvl);
            }
        }
        "volume_spike" => {
            let newer = intel
                .volume_spike_at
                .map(|at| message.created_at > at)
                .unwrap_or(true);
            if newer {
                intel.analyst_volume_spike = true;
                intel.volume_spike_at = Some(message.created_at);
            }
        }
        "price_alert" => {
            if let (Some(symbol), Some(price)) = (
                payload.get("symbol").and_then(|s| s.as_str()),
                payload.get("price_usd").and_then(|p| p.as_f64()),
            ) {
                intel.price_alerts.push(PriceAlert {
                    symbol: symbol.to_string(),
                    price_usd: price,
                    change_24h_pct: payload
                        .get("change_24h_pct")
                        .and_then(|c| c.as_f64())
                        .unwrap_or(0.0),
                });
            }
        }
        "" => debug!("consult: untyped intel from {}, ignoring", message.from),
        other => debug!("consult: unknown intel type '{}' from {}", other, message.from),
    }
}

/// Build the cycle's swarm view from recent CFO-addressed rows.
#[tracing::instrument(skip_all)]
pub async fn consult_intel(bus: &MessageRepository, now: DateTime<Utc>) -> SwarmIntel {
    let since = now - Duration::hours(INTEL_WINDOW_HOURS);
    let messages = match bus.recent_for(CFO, since).await {
        Ok(messages) => messages,
        Err(e) => {
            debug!("consult: bus read failed, empty intel: {}", e);
            Vec::new()
        }
    };

    let mut intel = SwarmIntel::default();
    let mut scout_seen_at = None;
    for message in &messages {
        fold_message(&mut intel, message, &mut scout_seen_at);
    }
    intel.assess(now);
    intel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intel::MarketCondition;

    fn message(
        from: &str,
        kind: MessageType,
        priority: MessagePriority,
        payload: serde_json::Value,
        age_minutes: i64,
    ) -> Message {
        let mut msg = Message::new(from, CFO, kind, priority, payload, None);
        msg.created_at = Utc::now() - Duration::minutes(age_minutes);
        msg
    }

    fn fold_all(messages: &[Message]) -> SwarmIntel {
        let mut intel = SwarmIntel::default();
        let mut scout_seen_at = None;
        for msg in messages {
            fold_message(&mut intel, msg, &mut scout_seen_at);
        }
        intel.assess(Utc::now());
        intel
    }

    #[test]
    fn test_freshest_scout_reading_wins() {
        let intel = fold_all(&[
            message(
                "nova-scout",
                MessageType::Intel,
                MessagePriority::Medium,
                serde_json::json!({"intel_type": "scout_sentiment", "crypto_bullish": false, "summary": ""}),
                30,
            ),
            message(
                "nova-scout",
                MessageType::Intel,
                MessagePriority::Medium,
                serde_json::json!({"intel_type": "scout_sentiment", "crypto_bullish": true, "summary": ""}),
                5,
            ),
        ]);
        assert_eq!(intel.scout_bullish, Some(true));
        assert!((intel.risk_multiplier - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_sentiment_inferred_from_summary_when_flag_absent() {
        let intel = fold_all(&[message(
            "nova-scout",
            MessageType::Intel,
            MessagePriority::Medium,
            serde_json::json!({
                "intel_type": "narrative_shift",
                "summary": "Cascading liquidations spark fear across majors",
            }),
            10,
        )]);
        assert_eq!(intel.scout_bullish, Some(false));
    }

    #[test]
    fn test_market_crash_command_sets_danger() {
        let intel = fold_all(&[message(
            "nova-supervisor",
            MessageType::Command,
            MessagePriority::Critical,
            serde_json::json!({"command": "market_crash", "description": "SOL -22%"}),
            3,
        )]);
        assert!(intel.guardian_critical);
        assert_eq!(intel.condition(), MarketCondition::Danger);
    }

    #[test]
    fn test_volume_spike_and_token_tables() {
        let intel = fold_all(&[
            message(
                "nova-supervisor",
                MessageType::Intel,
                MessagePriority::High,
                serde_json::json!({"intel_type": "volume_spike", "symbol": "WIF", "multiple": 2.4}),
                15,
            ),
            message(
                "nova-analyst",
                MessageType::Intel,
                MessagePriority::Medium,
                serde_json::json!({"intel_type": "token_prices", "tokens": [
                    {"symbol": "SOL", "price_usd": 160.0, "change_24h_pct": 1.2, "trending": false},
                    {"symbol": "WIF", "price_usd": 2.1, "change_24h_pct": 24.0, "trending": true},
                ]}),
                10,
            ),
        ]);
        assert!(intel.analyst_volume_spike);
        assert_eq!(intel.token_prices.len(), 2);
        assert!(intel.token_prices["WIF"].trending);
        // 1.0 + 0.15 spike = 1.15
        assert!((intel.risk_multiplier - 1.15).abs() < 1e-9);
    }
}
