//! One-shot result slots for scheduled transfers
//!
//! A [`Waiter`] is the producing half and lives in the request store until the
//! event router claims it. Resolving consumes it, so a request can only ever be
//! resolved once. The consuming half, [`TransferHandle`], is what `schedule()`
//! returns to the caller and resolves to the outcome.

use crate::error::TransferError;
use crate::types::RequestId;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Terminal outcome of a single transfer request
pub type TransferOutcome = std::result::Result<PathBuf, TransferError>;

/// Producing half of a request's one-shot result slot
#[derive(Debug)]
pub struct Waiter {
    id: RequestId,
    tx: oneshot::Sender<TransferOutcome>,
}

impl Waiter {
    /// Create a connected waiter / handle pair for an identity
    pub fn channel(id: RequestId) -> (Waiter, TransferHandle) {
        let (tx, rx) = oneshot::channel();
        (
            Waiter { id: id.clone(), tx },
            TransferHandle { id, rx },
        )
    }

    /// Identity this waiter belongs to
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Whether the caller has dropped its handle
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolve the request, consuming the waiter
    ///
    /// Returns `false` if the caller already dropped its [`TransferHandle`].
    pub fn resolve(self, outcome: TransferOutcome) -> bool {
        let delivered = self.tx.send(outcome).is_ok();
        if !delivered {
            tracing::debug!(identity = %self.id, "transfer handle dropped before resolution");
        }
        delivered
    }
}

/// Awaitable result of a scheduled transfer
///
/// Resolves exactly once, with the final location on success or a
/// [`TransferError`]. If the coordinator drops the waiter without resolving it
/// the handle resolves to [`TransferError::Abandoned`].
#[derive(Debug)]
#[must_use = "a TransferHandle does nothing unless awaited"]
pub struct TransferHandle {
    id: RequestId,
    rx: oneshot::Receiver<TransferOutcome>,
}

impl TransferHandle {
    /// Identity of the request this handle resolves
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Non-blocking check for the outcome
    ///
    /// Returns `None` while the request is still outstanding.
    pub fn try_outcome(&mut self) -> Option<TransferOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TransferError::Abandoned)),
        }
    }
}

impl Future for TransferHandle {
    type Output = TransferOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TransferError::Abandoned)))
    }
}
