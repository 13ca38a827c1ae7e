//! Download coordinator split into focused submodules.
//!
//! The `DownloadCoordinator` struct and its methods are organized by domain:
//! - [`schedule`] - Scheduling, re-attachment and cancellation of requests
//! - [`drain`] - Batch drain handling and the host completion signal
//! - [`lifecycle`] - Shutdown coordination

mod drain;
mod lifecycle;
mod schedule;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub(crate) use drain::BatchDrainer;
pub use drain::{CompletionHandler, DrainReport};

use crate::config::Config;
use crate::db::Database;
use crate::engine::{TransferEngine, TransferEventSink};
use crate::error::{Error, Result};
use crate::router::EventRouter;
use crate::store::{DurableStore, RequestStore};
use crate::tracker::JobTracker;
use crate::types::{DurableRecord, Event};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::broadcast;

/// Main coordinator instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the request store, the pending-task tracker and the event router, and
/// drives an external [`TransferEngine`] that reports back to the router.
#[derive(Clone)]
pub struct DownloadCoordinator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Durable destinations plus in-memory waiters
    pub(crate) store: Arc<RequestStore>,
    /// Reconciliation jobs currently running
    pub(crate) tracker: Arc<JobTracker>,
    /// Event sink handed to the engine
    pub(crate) router: Arc<EventRouter>,
    /// Batch drain handling and the host completion handler
    pub(crate) drainer: Arc<BatchDrainer>,
    /// External transfer engine
    pub(crate) engine: Arc<dyn TransferEngine>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Flag to indicate whether new requests are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// SQLite database when the coordinator owns its persistence
    pub(crate) db: Option<Arc<Database>>,
    /// Whether the previous process life ended without a clean shutdown
    unclean_previous_shutdown: bool,
}

impl DownloadCoordinator {
    /// Create a coordinator persisting requests to the configured SQLite database
    ///
    /// `engine` is called once with the event sink the engine must report to.
    /// This:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Records whether the previous process shut down cleanly
    /// - Creates the staging directory
    pub async fn new<F>(config: Config, engine: F) -> Result<Self>
    where
        F: FnOnce(Arc<dyn TransferEventSink>) -> Result<Arc<dyn TransferEngine>>,
    {
        config.validate()?;

        // Initialize database
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Check how the last process life ended before marking this start
        let unclean = db.was_unclean_shutdown().await?;
        if unclean {
            tracing::warn!(
                "previous process did not shut down cleanly, outstanding requests may be recovered"
            );
        }
        db.set_clean_start().await?;

        Self::build(config, db.clone(), Some(db), unclean, engine).await
    }

    /// Create a coordinator over an injected durable store
    ///
    /// No clean-shutdown bookkeeping is done; [`recovered_from_unclean_shutdown`]
    /// always reports `false`.
    ///
    /// [`recovered_from_unclean_shutdown`]: DownloadCoordinator::recovered_from_unclean_shutdown
    pub async fn with_store<F>(
        config: Config,
        durable: Arc<dyn DurableStore>,
        engine: F,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<dyn TransferEventSink>) -> Result<Arc<dyn TransferEngine>>,
    {
        config.validate()?;
        Self::build(config, durable, None, false, engine).await
    }

    async fn build<F>(
        config: Config,
        durable: Arc<dyn DurableStore>,
        db: Option<Arc<Database>>,
        unclean_previous_shutdown: bool,
        engine: F,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<dyn TransferEventSink>) -> Result<Arc<dyn TransferEngine>>,
    {
        // Router-owned staging directory for finished payloads
        tokio::fs::create_dir_all(config.temp_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        config.temp_dir().display(),
                        e
                    ),
                ))
            })?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let config = Arc::new(config);
        let tracker = Arc::new(JobTracker::new());
        let store = Arc::new(RequestStore::new(durable));
        let drainer = Arc::new(BatchDrainer::new(config.drain.timeout, event_tx.clone()));
        let router = Arc::new(EventRouter::new(
            store.clone(),
            tracker.clone(),
            drainer.clone(),
            config.temp_dir().clone(),
            config.file_collision,
            event_tx.clone(),
            tokio::runtime::Handle::current(),
        ));

        let sink: Arc<dyn TransferEventSink> = router.clone();
        let engine = engine(sink)?;

        tracing::info!(
            session = %config.session.identifier,
            engine = engine.name(),
            store = store.backend(),
            "download coordinator initialized"
        );

        Ok(Self {
            config,
            store,
            tracker,
            router,
            drainer,
            engine,
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            db,
            unclean_previous_shutdown,
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Every subscriber receives every event emitted after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The sink the engine reports to
    ///
    /// Hosts that relay engine events themselves (for example from an OS
    /// callback) deliver them here.
    pub fn event_sink(&self) -> Arc<dyn TransferEventSink> {
        self.router.clone()
    }

    /// Install the host's "all work finished" callback for the current wake cycle
    ///
    /// The next drain takes the handler and invokes it exactly once.
    pub fn set_completion_handler(&self, handler: impl FnOnce() + Send + 'static) {
        self.drainer.set_completion_handler(Box::new(handler));
    }

    /// Wait for every job tracked right now, then signal the host
    ///
    /// The tracker is snapshotted when this is called, not when the returned
    /// future is first polled. Bounded by `drain.timeout`; the host is
    /// signalled even when the wait times out.
    pub fn on_batch_drained(&self) -> impl Future<Output = DrainReport> + Send + 'static {
        let jobs = self.tracker.snapshot();
        let drainer = Arc::clone(&self.drainer);
        async move { drainer.drain(jobs).await }
    }

    /// Number of reconciliation jobs currently running
    pub fn pending_jobs(&self) -> usize {
        self.tracker.len()
    }

    /// Durable records still outstanding, including ones left by earlier processes
    pub async fn recovered(&self) -> Result<Vec<DurableRecord>> {
        self.store.records().await
    }

    /// Whether the previous process life ended without a clean shutdown
    pub fn recovered_from_unclean_shutdown(&self) -> bool {
        self.unclean_previous_shutdown
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
