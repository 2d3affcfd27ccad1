use crate::domain::message::{Message, MessagePriority, MessageType};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

/// Durable message bus over the shared `messages` table.
///
/// Delivery contract: a poll returns unacknowledged, unexpired rows addressed
/// to the consumer, ordered by priority (critical first) then age. An
/// acknowledged row is never returned again; it is retained for the audit
/// window and reclaimed by the cleanup task.
#[derive(Clone)]
pub struct MessageRepository {
    database: Database,
}

type MessageRow = (
    String,         // id
    String,         // from_agent
    String,         // to_agent
    String,         // kind
    String,         // priority
    String,         // payload
    bool,           // acknowledged
    Option<String>, // acknowledged_at
    Option<String>, // expires_at
    String,         // created_at
);

impl MessageRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Durable enqueue.
    pub async fn send(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, from_agent, to_agent, kind, priority, payload,
                acknowledged, acknowledged_at, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(message.id.to_string())
        .bind(&message.from)
        .bind(&message.to)
        .bind(message.kind.as_str())
        .bind(message.priority.as_str())
        .bind(message.payload.to_string())
        .bind(message.acknowledged)
        .bind(message.acknowledged_at.map(|t| t.to_rfc3339()))
        .bind(message.expires_at.map(|t| t.to_rfc3339()))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to enqueue message")?;

        Ok(())
    }

    /// Poll up to `limit` deliverable messages for one recipient, ordered by
    /// the canonical priority total order then `created_at ASC`.
    pub async fn read_for(&self, to: &str, limit: u32) -> Result<Vec<Message>> {
        let now = Utc::now().to_rfc3339();
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, from_agent, to_agent, kind, priority, payload,
                   acknowledged, acknowledged_at, expires_at, created_at
            FROM messages
            WHERE to_agent = $1
              AND acknowledged = 0
              AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY CASE priority
                WHEN 'critical' THEN 0
                WHEN 'high' THEN 1
                WHEN 'medium' THEN 2
                ELSE 3
            END, created_at ASC
            LIMIT $3
            "#,
        )
        .bind(to)
        .bind(&now)
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to read messages")?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    /// Mark a message acknowledged. Idempotent; re-acking is a no-op.
    pub async fn acknowledge(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE messages
            SET acknowledged = 1, acknowledged_at = $2
            WHERE id = $1 AND acknowledged = 0
            "#,
        )
        .bind(id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to acknowledge message")?;

        Ok(())
    }

    /// All rows addressed to one recipient created after `since`, regardless
    /// of ack status. Used by the intel consult and the briefing window.
    pub async fn recent_for(&self, to: &str, since: DateTime<Utc>) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, from_agent, to_agent, kind, priority, payload,
                   acknowledged, acknowledged_at, expires_at, created_at
            FROM messages
            WHERE to_agent = $1 AND created_at > $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(to)
        .bind(since.to_rfc3339())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to read recent messages")?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    /// Reclaim acknowledged messages older than the audit window.
    pub async fn delete_acknowledged_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE acknowledged = 1 AND acknowledged_at < $1",
        )
        .bind(cutoff.to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to reclaim acknowledged messages")?;

        Ok(result.rows_affected())
    }

    /// Reclaim messages past their TTL.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM messages WHERE expires_at IS NOT NULL AND expires_at < $1")
                .bind(now.to_rfc3339())
                .execute(&self.database.pool)
                .await
                .context("Failed to reclaim expired messages")?;

        Ok(result.rows_affected())
    }

    fn row_to_message(row: MessageRow) -> Result<Message> {
        let (id, from, to, kind, priority, payload, acknowledged, acked_at, expires_at, created_at) =
            row;
        Ok(Message {
            id: Uuid::parse_str(&id).context("Invalid message id")?,
            from,
            to,
            kind: MessageType::from_str(&kind)?,
            priority: MessagePriority::from_str(&priority)?,
            payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            acknowledged,
            acknowledged_at: parse_timestamp(acked_at),
            expires_at: parse_timestamp(expires_at),
            created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
        })
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}
