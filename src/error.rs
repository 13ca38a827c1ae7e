//! Error types for background-dl
//!
//! Two layers of errors live here:
//! - [`Error`] is returned by coordinator and persistence operations (opening the
//!   database, scheduling a transfer, cancelling, shutting down).
//! - [`TransferError`] is the terminal outcome of a single request. It is never
//!   returned from an operation directly; it reaches the caller through the
//!   request's [`TransferHandle`](crate::waiter::TransferHandle).

use crate::types::{RequestId, ResponseInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for background-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for background-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "session.temp_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error raised by the reference HTTP engine
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request for the same identity is already outstanding
    #[error("duplicate request: {0}")]
    Duplicate(String),

    /// No durable record exists for the identity
    #[error("request not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new requests
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// The transfer engine refused or failed to start/cancel a transfer
    #[error("transfer engine error: {0}")]
    Engine(String),

    /// A request reached a failed terminal outcome
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Terminal failure of a single transfer request
///
/// Causes are carried as rendered strings so an outcome can be cloned into
/// lifecycle [`Event`](crate::types::Event)s as well as delivered to the waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    /// No durable record was found for the identity at reconciliation time
    #[error("unknown request: {id}")]
    UnknownRequest {
        /// The identity the event referred to
        id: RequestId,
    },

    /// The engine reported a non-success terminal status
    #[error("server error: {}", describe_status(.status))]
    ServerError {
        /// The response observed by the engine, if any
        status: Option<ResponseInfo>,
    },

    /// Transport-level failure reported by the engine
    #[error("client error: {cause}")]
    ClientError {
        /// Rendered underlying cause
        cause: String,
    },

    /// Moving the completed artifact into place failed
    #[error("file system error: {cause}")]
    FileSystemError {
        /// Rendered underlying cause
        cause: String,
    },

    /// The request store could not be read while reconciling an event
    #[error("request store error: {cause}")]
    StoreError {
        /// Rendered underlying cause
        cause: String,
    },

    /// The request was cancelled before it completed
    #[error("transfer cancelled")]
    Cancelled,

    /// The waiter was dropped without being resolved
    #[error("transfer abandoned before a result was delivered")]
    Abandoned,
}

impl TransferError {
    /// Build a client error from any displayable cause
    pub fn client(cause: impl std::fmt::Display) -> Self {
        Self::ClientError {
            cause: cause.to_string(),
        }
    }

    /// Build a file system error from any displayable cause
    pub fn file_system(cause: impl std::fmt::Display) -> Self {
        Self::FileSystemError {
            cause: cause.to_string(),
        }
    }

    /// Build a request store error from any displayable cause
    pub fn store(cause: impl std::fmt::Display) -> Self {
        Self::StoreError {
            cause: cause.to_string(),
        }
    }
}

fn describe_status(status: &Option<ResponseInfo>) -> String {
    match status {
        Some(response) => format!("HTTP {}", response.status),
        None => "no response".to_string(),
    }
}
