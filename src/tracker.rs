//! Pending-task tracker
//!
//! Registry of the reconciliation jobs currently running, keyed by request
//! identity. The coordinator snapshots it when a batch drains to know which jobs
//! to wait for before telling the host that all work is finished.

use crate::types::RequestId;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Unique identifier for a tracked job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable handle to a running reconciliation job
///
/// Any number of clones can wait for the job; all of them complete when the
/// underlying task finishes, whether it returned normally or panicked.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    identity: RequestId,
    done: Shared<BoxFuture<'static, ()>>,
}

impl JobHandle {
    /// Create a handle that completes when `done` completes
    pub fn new(id: JobId, identity: RequestId, done: BoxFuture<'static, ()>) -> Self {
        Self {
            id,
            identity,
            done: done.shared(),
        }
    }

    /// Job identifier
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Identity of the request the job is reconciling
    pub fn identity(&self) -> &RequestId {
        &self.identity
    }

    /// Future that completes when the job has finished
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        self.done.clone()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Concurrency-safe registry of in-flight jobs
#[derive(Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<RequestId, JobHandle>>,
    next_id: AtomicU64,
}

impl JobTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<RequestId, JobHandle>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh job identifier
    pub fn next_job_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a job; an existing entry for the identity is replaced
    ///
    /// A replaced job drops out of later snapshots. Jobs started through
    /// [`spawn`](Self::spawn) avoid this by holding their entry until every
    /// earlier job for the identity has finished.
    pub fn register(&self, identity: RequestId, job: JobHandle) {
        if let Some(previous) = self.jobs().insert(identity.clone(), job) {
            tracing::debug!(
                identity = %identity,
                replaced_job = %previous.id(),
                "tracked job replaced"
            );
        }
    }

    /// Remove the entry for an identity (no-op if absent)
    pub fn unregister(&self, identity: &RequestId) {
        self.jobs().remove(identity);
    }

    /// Remove the entry for an identity only if it still belongs to `job`
    ///
    /// A job finishing after a newer job for the same identity replaced it must
    /// not drop the newer registration.
    pub fn unregister_job(&self, identity: &RequestId, job: JobId) {
        let mut jobs = self.jobs();
        if jobs.get(identity).is_some_and(|current| current.id() == job) {
            jobs.remove(identity);
        }
    }

    /// The job currently registered for an identity
    pub fn get(&self, identity: &RequestId) -> Option<JobHandle> {
        self.jobs().get(identity).cloned()
    }

    /// All jobs registered at the time of the call
    pub fn snapshot(&self) -> Vec<JobHandle> {
        self.jobs().values().cloned().collect()
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    /// Whether no job is registered
    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Spawn `job` on `runtime` and register it under `identity`
    ///
    /// The job does not start running until it is registered, and it
    /// unregisters itself when it ends, so a job can never finish before its
    /// own registration and leave a stale entry behind.
    ///
    /// When another job for the identity is still registered, the new job
    /// takes over the entry but only ends once the earlier one has finished,
    /// so a snapshot holding the new handle covers both.
    pub fn spawn<F>(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        identity: RequestId,
        job: F,
    ) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_job_id();
        let (registered_tx, registered_rx) = tokio::sync::oneshot::channel::<Option<JobHandle>>();
        let guard = Unregister {
            tracker: Arc::clone(self),
            identity: identity.clone(),
            job: id,
        };

        let task = runtime.spawn({
            let identity = identity.clone();
            async move {
                let _guard = guard;
                let previous = registered_rx.await.ok().flatten();
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    tracing::error!(identity = %identity, job = %id, "tracked job panicked");
                }
                if let Some(previous) = previous {
                    previous.finished().await;
                }
            }
        });

        let handle = JobHandle::new(
            id,
            identity.clone(),
            async move {
                let _ = task.await;
            }
            .boxed(),
        );

        let previous = self.jobs().insert(identity.clone(), handle.clone());
        if let Some(previous) = &previous {
            tracing::debug!(
                identity = %identity,
                job = %id,
                earlier_job = %previous.id(),
                "tracked job shares identity with a running job"
            );
        }
        let _ = registered_tx.send(previous);
        tracing::debug!(identity = %identity, job = %id, "tracked job started");

        handle
    }
}

/// Unregisters a job when its task ends, including by panic or cancellation
struct Unregister {
    tracker: Arc<JobTracker>,
    identity: RequestId,
    job: JobId,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        self.tracker.unregister_job(&self.identity, self.job);
    }
}
