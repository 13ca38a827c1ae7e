//! Traits at the seam between the coordinator and the external transfer engine

use crate::types::{RequestId, TaskInfo, TransferEvent};
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// External subsystem that executes transfers
///
/// The engine owns connections, retries and scheduling. It reports back through
/// the [`TransferEventSink`] it was constructed with, naming each transfer by the
/// identity passed to [`begin`](TransferEngine::begin).
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Start transferring `source`, keyed by `id`
    async fn begin(&self, id: &RequestId, source: &Url) -> crate::Result<()>;

    /// Abandon the transfer keyed by `id`; unknown identities are ignored
    ///
    /// Any event the engine reports for the abandoned transfer must be
    /// delivered before this returns, so the identity can be scheduled again
    /// without a late event being matched to the new request.
    async fn cancel(&self, id: &RequestId) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Receiver of engine events
///
/// Callbacks are synchronous and may arrive from any thread, concurrently, in
/// any order across identities. `temp_location` passed to
/// [`finished`](TransferEventSink::finished) only exists until the callback
/// returns.
pub trait TransferEventSink: Send + Sync {
    /// The transfer finished and its payload sits at `temp_location`
    fn finished(&self, task: TaskInfo, temp_location: &Path);

    /// The transfer failed before completion
    fn failed(&self, id: RequestId, error: String);

    /// No further events are pending for the current wake cycle
    fn batch_drained(&self);

    /// Dispatch a [`TransferEvent`] to the matching callback
    fn deliver(&self, event: TransferEvent) {
        match event {
            TransferEvent::Finished {
                task,
                temp_location,
            } => self.finished(task, &temp_location),
            TransferEvent::Failed { id, error } => self.failed(id, error),
            TransferEvent::BatchDrained => self.batch_drained(),
        }
    }
}
