//! Database layer for background-dl
//!
//! Handles SQLite persistence for the durable half of the request store.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle and schema
//! - [`transfers`] - Durable identity → destination records
//! - [`state`] - Runtime state (clean start / shutdown tracking)

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod state;
mod transfers;

/// Durable transfer record from database
#[derive(Debug, Clone, FromRow)]
pub struct TransferRecord {
    /// Request identity (rendered source URL)
    pub identity: String,
    /// Destination path the artifact is moved to
    pub destination: String,
    /// Unix timestamp when the record was written
    pub created_at: i64,
}

/// Database handle for background-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
