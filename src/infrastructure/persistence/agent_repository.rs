use crate::domain::message::{AgentRegistration, Heartbeat, HeartbeatStatus};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// Agent registry and heartbeat persistence.
#[derive(Clone)]
pub struct AgentRepository {
    database: Database,
}

impl AgentRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Upsert a registration row. Idempotent: two calls with the same name
    /// produce one row.
    pub async fn register(&self, registration: &AgentRegistration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_registrations (name, kind, enabled, config, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                enabled = excluded.enabled,
                config = excluded.config,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&registration.name)
        .bind(&registration.kind)
        .bind(registration.enabled)
        .bind(registration.config.to_string())
        .bind(registration.updated_at.to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to register agent")?;

        Ok(())
    }

    pub async fn list_registrations(&self) -> Result<Vec<AgentRegistration>> {
        let rows = sqlx::query_as::<_, (String, String, bool, String, String)>(
            "SELECT name, kind, enabled, config, updated_at FROM agent_registrations",
        )
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list registrations")?;

        Ok(rows
            .into_iter()
            .map(|(name, kind, enabled, config, updated_at)| AgentRegistration {
                name,
                kind,
                enabled,
                config: serde_json::from_str(&config).unwrap_or(serde_json::Value::Null),
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    /// Upsert a heartbeat. Status is already constrained to the four
    /// registry values; task-level labels travel in `current_task`.
    pub async fn beat(&self, heartbeat: &Heartbeat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO heartbeats (name, status, current_task, last_beat)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(name) DO UPDATE SET
                status = excluded.status,
                current_task = excluded.current_task,
                last_beat = excluded.last_beat
            "#,
        )
        .bind(&heartbeat.name)
        .bind(heartbeat.status.as_str())
        .bind(&heartbeat.current_task)
        .bind(heartbeat.last_beat.to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("Failed to write heartbeat")?;

        Ok(())
    }

    pub async fn list_heartbeats(&self) -> Result<Vec<Heartbeat>> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, String)>(
            "SELECT name, status, current_task, last_beat FROM heartbeats",
        )
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list heartbeats")?;

        rows.into_iter()
            .map(|(name, status, current_task, last_beat)| {
                Ok(Heartbeat {
                    name,
                    status: HeartbeatStatus::from_str(&status)?,
                    current_task,
                    last_beat: DateTime::parse_from_rfc3339(&last_beat)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    /// Agents with a live heartbeat newer than `since`.
    pub async fn active_agents(&self, since: DateTime<Utc>) -> Result<Vec<Heartbeat>> {
        Ok(self
            .list_heartbeats()
            .await?
            .into_iter()
            .filter(|hb| hb.status == HeartbeatStatus::Alive && hb.last_beat > since)
            .collect())
    }

    /// Reclaim heartbeats of stopped agents older than the audit window.
    pub async fn delete_disabled_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM heartbeats WHERE status = 'disabled' AND last_beat < $1")
                .bind(cutoff.to_rfc3339())
                .execute(&self.database.pool)
                .await
                .context("Failed to reclaim disabled heartbeats")?;

        Ok(result.rows_affected())
    }
}
