//! Database lifecycle and schema.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::path::Path;

use super::Database;

/// Schema version written by [`SCHEMA`]
const SCHEMA_VERSION: i64 = 1;

/// Tables holding durable transfer records and runtime state
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE transfer_records (
        identity TEXT PRIMARY KEY NOT NULL,
        destination TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE runtime_state (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

fn migration_failed(context: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(DatabaseError::MigrationFailed(format!("{}: {}", context, e)))
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply the schema
    ///
    /// Writes are committed with `synchronous = FULL` so a record survives the
    /// process being killed right after the write returns.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.apply_schema().await?;
        Ok(db)
    }

    /// Create the tables in one transaction unless this schema version is recorded
    async fn apply_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(migration_failed("Failed to create schema_version table"))?;

        if self.schema_version().await? >= SCHEMA_VERSION {
            return Ok(());
        }

        tracing::info!(version = SCHEMA_VERSION, "Applying database schema");

        // Dropping the transaction on an error path rolls it back
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(migration_failed("Failed to begin transaction"))?;
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(migration_failed("Failed to create table"))?;
        }
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(SCHEMA_VERSION)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(migration_failed("Failed to record schema version"))?;
        tx.commit()
            .await
            .map_err(migration_failed("Failed to commit schema"))?;

        Ok(())
    }

    /// Current schema version (0 if the schema has not been applied)
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;

        Ok(version.unwrap_or(0))
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
