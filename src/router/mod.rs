//! Event router
//!
//! Receives engine callbacks and turns each `Finished` / `Failed` event into
//! exactly one tracked reconciliation job. `BatchDrained` carries no identity
//! and is forwarded to the batch drainer.
//!
//! A finished payload is staged synchronously inside the callback, because the
//! engine only guarantees it exists until the callback returns. Everything else
//! (store lookup, status inspection, final move) happens in the job.

mod reconcile;


use reconcile::Reconciler;

use crate::config::FileCollisionAction;
use crate::coordinator::{BatchDrainer, DrainReport};
use crate::engine::TransferEventSink;
use crate::store::RequestStore;
use crate::tracker::{JobHandle, JobTracker};
use crate::types::{Event, RequestId, TaskInfo};
use crate::utils::move_file_blocking;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Engine event sink that reconciles events against the request store
///
/// Callbacks may arrive on any thread, including threads outside the runtime;
/// jobs are spawned on the runtime captured at construction.
pub struct EventRouter {
    reconciler: Arc<Reconciler>,
    tracker: Arc<JobTracker>,
    drainer: Arc<BatchDrainer>,
    staging_dir: PathBuf,
    runtime: Handle,
    staged_seq: AtomicU64,
}

impl EventRouter {
    pub(crate) fn new(
        store: Arc<RequestStore>,
        tracker: Arc<JobTracker>,
        drainer: Arc<BatchDrainer>,
        staging_dir: PathBuf,
        file_collision: FileCollisionAction,
        event_tx: broadcast::Sender<Event>,
        runtime: Handle,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(store, file_collision, event_tx)),
            tracker,
            drainer,
            staging_dir,
            runtime,
            staged_seq: AtomicU64::new(0),
        }
    }

    /// Handle a `Finished` event
    ///
    /// Stages the payload before returning, then reconciles in a tracked job.
    pub fn on_finished(&self, task: TaskInfo, temp_location: &Path) -> JobHandle {
        let staged = self.stage(&task.id, temp_location);
        let reconciler = Arc::clone(&self.reconciler);
        let id = task.id.clone();
        self.tracker.spawn(&self.runtime, id, async move {
            reconciler.finished(task, staged).await;
        })
    }

    /// Handle a `Failed` event
    pub fn on_failed(&self, id: RequestId, error: String) -> JobHandle {
        let reconciler = Arc::clone(&self.reconciler);
        self.tracker.spawn(&self.runtime, id.clone(), async move {
            reconciler.failed(id, error).await;
        })
    }

    /// Handle a `BatchDrained` event by running a drain cycle
    ///
    /// The set of jobs to wait for is fixed before this returns; jobs for
    /// events delivered afterwards belong to the next batch.
    pub fn on_batch_drained(&self) -> JoinHandle<DrainReport> {
        let jobs = self.tracker.snapshot();
        let drainer = Arc::clone(&self.drainer);
        self.runtime.spawn(async move { drainer.drain(jobs).await })
    }

    fn stage(&self, id: &RequestId, temp_location: &Path) -> io::Result<PathBuf> {
        let name = temp_location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transfer".to_string());
        let seq = self.staged_seq.fetch_add(1, Ordering::Relaxed);
        let staged = self.staging_dir.join(format!("{}-{}", seq, name));

        match move_file_blocking(temp_location, &staged) {
            Ok(()) => {
                tracing::debug!(identity = %id, ?staged, "staged finished payload");
                Ok(staged)
            }
            Err(e) => {
                tracing::warn!(
                    identity = %id,
                    ?temp_location,
                    error = %e,
                    "failed to stage finished payload"
                );
                Err(e)
            }
        }
    }
}

impl TransferEventSink for EventRouter {
    fn finished(&self, task: TaskInfo, temp_location: &Path) {
        self.on_finished(task, temp_location);
    }

    fn failed(&self, id: RequestId, error: String) {
        self.on_failed(id, error);
    }

    fn batch_drained(&self) {
        self.on_batch_drained();
    }
}
