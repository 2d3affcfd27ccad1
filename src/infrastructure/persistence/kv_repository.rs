use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Agent state blobs live under this prefix, one row per agent name.
pub const AGENT_STATE_PREFIX: &str = "agent_state:";

/// Adaptive learning parameters, a single process-wide row.
pub const ADAPTIVE_PARAMS_KEY: &str = "learning:adaptive_params";

/// Per-cycle audit rows; reclaimed after the audit window.
pub const AUDIT_PREFIX: &str = "audit:";

/// Schemaless key/value persistence over the `kv_store` table.
#[derive(Clone)]
pub struct KvRepository {
    database: Database,
}

impl KvRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn put(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to upsert KV entry")?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.database.pool)
            .await
            .context("Failed to read KV entry")?;

        Ok(row.and_then(|(value,)| serde_json::from_str(&value).ok()))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.database.pool)
            .await
            .context("Failed to delete KV entry")?;

        Ok(())
    }

    /// Save one agent's state blob, keyed by agent name.
    pub async fn save_agent_state(&self, agent: &str, state: &serde_json::Value) -> Result<()> {
        self.put(&format!("{}{}", AGENT_STATE_PREFIX, agent), state)
            .await
    }

    pub async fn restore_agent_state(&self, agent: &str) -> Result<Option<serde_json::Value>> {
        self.get(&format!("{}{}", AGENT_STATE_PREFIX, agent)).await
    }

    /// Reclaim rows under a prefix older than the retention cutoff.
    pub async fn delete_prefix_before(&self, prefix: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key LIKE $1 AND updated_at < $2")
            .bind(format!("{}%", prefix))
            .bind(cutoff.to_rfc3339())
            .execute(&self.database.pool)
            .await
            .context("Failed to reclaim KV entries")?;

        Ok(result.rows_affected())
    }
}
