//! # background-dl
//!
//! Restart-safe bookkeeping and event correlation for background downloads.
//!
//! The bytes are moved by an external transfer engine (an OS-managed background
//! session, or the bundled [`HttpTransferEngine`]). This crate records what was
//! requested, survives the host process being terminated and relaunched, matches
//! each engine event back to the request that caused it, resolves every request
//! exactly once, and tells the host when a batch of events has fully drained.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Durable before started** - A destination is committed before the engine begins
//! - **Exactly once** - A request's outcome is delivered through a one-shot handle
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use background_dl::{Config, DownloadCoordinator, HttpTransferEngine, TransferEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let session = config.session.clone();
//!
//!     let coordinator = DownloadCoordinator::new(config, move |sink| {
//!         Ok(Arc::new(HttpTransferEngine::new(&session, sink)?) as Arc<dyn TransferEngine>)
//!     })
//!     .await?;
//!
//!     // Ask the host to be told once everything has drained
//!     coordinator.set_completion_handler(|| println!("all background work finished"));
//!
//!     let source = url::Url::parse("https://example.com/cat.jpg")?;
//!     let location = coordinator.download(&source, "downloads/cat.jpg").await?;
//!     println!("saved to {}", location.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Database persistence layer
pub mod db;
/// Transfer engine seam and reference engine
pub mod engine;
/// Error types
pub mod error;
/// Engine event routing and reconciliation
pub mod router;
/// Durable request store
pub mod store;
/// Pending-task tracker
pub mod tracker;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// One-shot result slots
pub mod waiter;

// Re-export commonly used types
pub use config::{Config, DuplicatePolicy, FileCollisionAction};
pub use coordinator::{DownloadCoordinator, DrainReport};
pub use db::Database;
pub use engine::{HttpTransferEngine, TransferEngine, TransferEventSink};
pub use error::{DatabaseError, Error, Result, TransferError};
pub use router::EventRouter;
pub use store::{DurableStore, MemoryStore, RequestStore};
pub use tracker::{JobHandle, JobTracker};
pub use types::{
    DurableRecord, Event, EventKind, RequestId, RequestState, ResponseInfo, TaskInfo,
    TransferEvent,
};
pub use waiter::{TransferHandle, TransferOutcome, Waiter};

/// Helper function to run the coordinator until a termination signal arrives.
///
/// Waits for SIGTERM or SIGINT (Ctrl+C elsewhere) and then calls the
/// coordinator's `shutdown()` method. Requests still outstanding keep their
/// durable records for the next process.
///
/// # Example
///
/// ```no_run
/// use background_dl::{Config, DownloadCoordinator, HttpTransferEngine, TransferEngine, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let session = config.session.clone();
///     let coordinator = DownloadCoordinator::new(config, move |sink| {
///         Ok(Arc::new(HttpTransferEngine::new(&session, sink)?) as Arc<dyn TransferEngine>)
///     })
///     .await?;
///
///     run_with_shutdown(coordinator).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(coordinator: DownloadCoordinator) -> Result<()> {
    wait_for_signal().await;
    coordinator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            // Restricted environments (containers, tests) may refuse registration
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
