//! Scheduling, re-attachment and cancellation of requests.

use crate::config::DuplicatePolicy;
use crate::error::{Error, Result, TransferError};
use crate::types::{Event, RequestId};
use crate::waiter::{TransferHandle, Waiter};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use url::Url;

use super::DownloadCoordinator;

impl DownloadCoordinator {
    /// Schedule a transfer of `source` into `destination`
    ///
    /// The durable record is committed before the engine is asked to begin, so
    /// the destination survives process termination from this point on. The
    /// returned handle resolves exactly once, driven by the event router.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - [`Error::Duplicate`] when the identity is already outstanding (under
    ///   [`DuplicatePolicy::Replace`], only while it is being reconciled)
    /// - the engine's error if it refuses to begin; nothing is left recorded
    pub async fn schedule(
        &self,
        source: &Url,
        destination: impl Into<PathBuf>,
    ) -> Result<TransferHandle> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let destination = destination.into();
        let id = RequestId::from_source(source);

        if self.config.duplicate_policy == DuplicatePolicy::Replace
            && self.cancel_request(&id).await?
        {
            tracing::info!(identity = %id, "replaced outstanding request");
        }

        let (waiter, handle) = Waiter::channel(id.clone());
        self.store.insert_new(&id, &destination, waiter).await?;
        self.emit_event(Event::Scheduled {
            id: id.clone(),
            destination: destination.clone(),
        });

        if let Err(e) = self.engine.begin(&id, source).await {
            tracing::error!(identity = %id, error = %e, "engine refused to begin transfer");
            if let Err(remove_err) = self.store.remove(&id).await {
                tracing::error!(
                    identity = %id,
                    error = %remove_err,
                    "failed to remove request after engine refusal"
                );
            }
            self.emit_event(Event::Failed {
                id,
                error: TransferError::client(&e),
            });
            return Err(e);
        }

        tracing::info!(
            identity = %id,
            ?destination,
            engine = self.engine.name(),
            "transfer scheduled"
        );
        Ok(handle)
    }

    /// Schedule a transfer and wait for its outcome
    pub async fn download(&self, source: &Url, destination: impl Into<PathBuf>) -> Result<PathBuf> {
        let handle = self.schedule(source, destination).await?;
        Ok(handle.await?)
    }

    /// Return `destination` if a file already exists there, otherwise download it
    pub async fn fetch(&self, source: &Url, destination: impl Into<PathBuf>) -> Result<PathBuf> {
        let destination = destination.into();
        if tokio::fs::try_exists(&destination).await? {
            tracing::debug!(?destination, "destination already present, skipping transfer");
            return Ok(destination);
        }
        self.download(source, destination).await
    }

    /// Attach a fresh waiter to a request scheduled by an earlier process
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] when no durable record exists for `source`
    /// - [`Error::Duplicate`] when a waiter is already attached or the request
    ///   is being reconciled
    pub async fn reattach(&self, source: &Url) -> Result<TransferHandle> {
        let id = RequestId::from_source(source);
        let (waiter, handle) = Waiter::channel(id.clone());
        let destination = self.store.attach(&id, waiter).await?;
        tracing::info!(identity = %id, ?destination, "reattached to outstanding request");
        Ok(handle)
    }

    /// Cancel an outstanding request
    ///
    /// Resolves its waiter with [`TransferError::Cancelled`], removes the store
    /// entry and asks the engine to abandon the transfer. Events the engine
    /// reports for the abandoned transfer are reconciled as orphaned before
    /// this returns. Returns `false` when there was nothing
    /// to cancel, including when the request is already being reconciled.
    pub async fn cancel(&self, source: &Url) -> Result<bool> {
        self.cancel_request(&RequestId::from_source(source)).await
    }

    pub(crate) async fn cancel_request(&self, id: &RequestId) -> Result<bool> {
        let Some(claim) = self.store.claim(id).await? else {
            tracing::debug!(identity = %id, "no cancellable request");
            return Ok(false);
        };

        let removed = self.store.remove(id).await;
        claim.resolve(Err(TransferError::Cancelled));

        if let Err(e) = self.engine.cancel(id).await {
            tracing::warn!(identity = %id, error = %e, "engine failed to cancel transfer");
        }
        // Events the engine reported while abandoning the transfer must not
        // reach a request scheduled after this returns
        if let Some(job) = self.tracker.get(id) {
            job.finished().await;
        }

        tracing::info!(identity = %id, "transfer cancelled");
        self.emit_event(Event::Cancelled { id: id.clone() });

        removed?;
        Ok(true)
    }
}
