use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared database wrapper. One pool for the whole swarm.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// In-memory database for tests. A single pinned connection: every
    /// pooled connection to `:memory:` would otherwise get its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Message bus table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                from_agent TEXT NOT NULL,
                to_agent TEXT NOT NULL,
                kind TEXT NOT NULL,
                priority TEXT NOT NULL,
                payload TEXT NOT NULL,
                acknowledged BOOLEAN NOT NULL DEFAULT 0,
                acknowledged_at TEXT,
                expires_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create messages table")?;

        // Index for the poll query: recipient + ack flag
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_to_unacked
            ON messages (to_agent, acknowledged, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create message index")?;

        // 2. Agent registry
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_registrations (
                name TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                config TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create agent_registrations table")?;

        // 3. Heartbeats, one row per agent
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS heartbeats (
                name TEXT PRIMARY KEY,
                status TEXT NOT NULL CHECK (status IN ('alive', 'degraded', 'dead', 'disabled')),
                current_task TEXT,
                last_beat TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create heartbeats table")?;

        // 4. KV store: agent state blobs, adaptive params, audit rows
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create kv_store table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
