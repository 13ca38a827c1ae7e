//! Batch drain handling
//!
//! When the engine reports that a batch has drained, every job tracked at that
//! moment is awaited (optionally bounded by a timeout) and the host's
//! completion handler is invoked once. Callers take the tracker snapshot at the
//! moment the event arrives and hand it to [`BatchDrainer::drain`].

use crate::tracker::JobHandle;
use crate::types::Event;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Host callback signalling that all background work is finished
pub type CompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// Summary of one drain cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Number of tracked jobs in the snapshot that was awaited
    pub jobs: usize,
    /// Whether the wait hit the drain timeout
    pub timed_out: bool,
    /// Whether a completion handler was installed and invoked
    pub signalled: bool,
}

pub(crate) struct BatchDrainer {
    completion: Mutex<Option<CompletionHandler>>,
    timeout: Option<Duration>,
    event_tx: broadcast::Sender<Event>,
}

impl BatchDrainer {
    pub(crate) fn new(timeout: Option<Duration>, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            completion: Mutex::new(None),
            timeout,
            event_tx,
        }
    }

    fn completion(&self) -> MutexGuard<'_, Option<CompletionHandler>> {
        self.completion.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_completion_handler(&self, handler: CompletionHandler) {
        if self.completion().replace(handler).is_some() {
            tracing::warn!("replaced a completion handler that was never invoked");
        }
    }

    /// Wait for a tracker snapshot, then signal the host
    ///
    /// Jobs registered after the snapshot belong to the next batch and are not
    /// awaited. On timeout the host is signalled anyway.
    pub(crate) async fn drain(&self, jobs: Vec<JobHandle>) -> DrainReport {
        let count = jobs.len();
        tracing::debug!(jobs = count, "batch drained, waiting for tracked jobs");

        let wait = futures::future::join_all(jobs.iter().map(|job| job.finished()));
        let timed_out = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.is_err(),
            None => {
                wait.await;
                false
            }
        };

        if timed_out {
            tracing::warn!(
                jobs = count,
                timeout_secs = self.timeout.map(|d| d.as_secs()),
                "timed out waiting for tracked jobs, signalling host anyway"
            );
        }

        let handler = self.completion().take();
        let signalled = handler.is_some();
        if let Some(handler) = handler {
            handler();
        }

        tracing::info!(jobs = count, timed_out, signalled, "batch drain complete");
        self.event_tx
            .send(Event::Drained {
                jobs: count,
                timed_out,
            })
            .ok();

        DrainReport {
            jobs: count,
            timed_out,
            signalled,
        }
    }
}
