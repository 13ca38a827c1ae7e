//! Per-event reconciliation jobs

use crate::config::FileCollisionAction;
use crate::error::{Error, TransferError};
use crate::store::{Claim, RequestStore};
use crate::types::{Event, EventKind, RequestId, RequestState, TaskInfo};
use crate::utils::move_into_place;
use crate::waiter::TransferOutcome;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Turns one engine event into one terminal outcome for its identity
pub(crate) struct Reconciler {
    store: Arc<RequestStore>,
    file_collision: FileCollisionAction,
    event_tx: broadcast::Sender<Event>,
}

impl Reconciler {
    pub(crate) fn new(
        store: Arc<RequestStore>,
        file_collision: FileCollisionAction,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            store,
            file_collision,
            event_tx,
        }
    }

    /// Reconcile a `Finished` event whose payload was staged at `staged`
    pub(crate) async fn finished(&self, task: TaskInfo, staged: io::Result<PathBuf>) -> RequestState {
        let claim = match self.claim(&task.id, EventKind::Finished).await {
            Ok(claim) => claim,
            Err(state) => {
                if let Ok(path) = &staged {
                    discard(path).await;
                }
                return state;
            }
        };

        let outcome = if !task.succeeded() {
            if let Ok(path) = &staged {
                discard(path).await;
            }
            Err(TransferError::ServerError {
                status: task.response,
            })
        } else {
            match staged {
                Err(e) => Err(TransferError::file_system(e)),
                Ok(path) => {
                    match move_into_place(&path, claim.destination(), self.file_collision).await {
                        Ok(location) => Ok(location),
                        Err(e) => {
                            discard(&path).await;
                            Err(TransferError::file_system(e))
                        }
                    }
                }
            }
        };

        self.settle(claim, outcome).await
    }

    /// Reconcile a `Failed` event; never touches the file system
    pub(crate) async fn failed(&self, id: RequestId, error: String) -> RequestState {
        match self.claim(&id, EventKind::Failed).await {
            Ok(claim) => self.settle(claim, Err(TransferError::client(error))).await,
            Err(state) => state,
        }
    }

    /// Claim the request, or report why the event ends here
    async fn claim(&self, id: &RequestId, kind: EventKind) -> Result<Claim, RequestState> {
        match self.store.claim(id).await {
            Ok(Some(claim)) => {
                tracing::debug!(identity = %id, ?kind, "request claimed for reconciliation");
                Ok(claim)
            }
            Ok(None) => {
                let error = TransferError::UnknownRequest { id: id.clone() };
                tracing::warn!(identity = %id, ?kind, error = %error, "orphaned transfer event");
                self.event_tx
                    .send(Event::Orphaned {
                        id: id.clone(),
                        kind,
                    })
                    .ok();
                Err(RequestState::Orphaned)
            }
            Err(e) => Err(self.store_failed(id, kind, e).await),
        }
    }

    /// Answer the caller when the durable record cannot be read
    ///
    /// The durable record, if any, is left for `recovered()` and `cancel()`.
    async fn store_failed(&self, id: &RequestId, kind: EventKind, cause: Error) -> RequestState {
        tracing::error!(identity = %id, ?kind, error = %cause, "request store lookup failed");
        let error = TransferError::store(&cause);

        let delivered = match self.store.take_waiter(id).await {
            Some(waiter) => waiter.resolve(Err(error.clone())),
            None => false,
        };
        if !delivered {
            tracing::warn!(identity = %id, "no waiter to receive request store failure");
        }

        self.event_tx
            .send(Event::Failed {
                id: id.clone(),
                error,
            })
            .ok();
        RequestState::Resolved
    }

    /// Remove the request, then deliver its outcome
    ///
    /// Removal comes first so that a caller woken by the outcome never observes
    /// a stale durable record for the identity.
    async fn settle(&self, claim: Claim, outcome: TransferOutcome) -> RequestState {
        let id = claim.id().clone();
        if let Err(e) = self.store.remove(&id).await {
            tracing::error!(identity = %id, error = %e, "failed to remove reconciled request");
        }

        let event = match &outcome {
            Ok(location) => {
                tracing::info!(identity = %id, ?location, "transfer completed");
                Event::Completed {
                    id,
                    location: location.clone(),
                }
            }
            Err(error) => {
                tracing::error!(identity = %id, error = %error, "transfer failed");
                Event::Failed {
                    id,
                    error: error.clone(),
                }
            }
        };

        claim.resolve(outcome);
        self.event_tx.send(event).ok();
        RequestState::Resolved
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(?path, error = %e, "failed to discard staged file");
    }
}
