//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::DownloadCoordinator;

impl DownloadCoordinator {
    /// Gracefully shut down the coordinator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new requests
    /// 2. Waits for running reconciliation jobs (bounded by `drain.timeout`)
    /// 3. Marks a clean shutdown in the database
    ///
    /// Outstanding requests keep their durable records and can be recovered
    /// by the next process.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new requests
        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // 2. Wait for running jobs
        let jobs = self.tracker.snapshot();
        let wait = futures::future::join_all(jobs.iter().map(|job| job.finished()));
        match self.config.drain.timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, wait).await.is_err() {
                    tracing::warn!(
                        jobs = jobs.len(),
                        "Timeout waiting for reconciliation jobs, proceeding with shutdown"
                    );
                }
            }
            None => {
                wait.await;
            }
        }

        // 3. Mark clean shutdown in database
        if let Some(db) = &self.db {
            if let Err(e) = db.set_clean_shutdown().await {
                tracing::error!(error = %e, "Failed to mark clean shutdown in database");
            } else {
                tracing::info!("Marked clean shutdown in database");
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
