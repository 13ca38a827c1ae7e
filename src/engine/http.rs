//! Reference transfer engine backed by reqwest
//!
//! A plain in-process engine for hosts without an OS-managed transfer service,
//! and for exercising the coordinator end to end. It performs no retries,
//! bandwidth shaping or authentication.

use super::traits::{TransferEngine, TransferEventSink};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::types::{RequestId, ResponseInfo, TaskInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

type ActiveTransfers = Arc<Mutex<HashMap<RequestId, Arc<TransferSlot>>>>;

fn lock(active: &ActiveTransfers) -> MutexGuard<'_, HashMap<RequestId, Arc<TransferSlot>>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared between a transfer and the engine; exactly one side reports the outcome
struct TransferSlot {
    token: CancellationToken,
    reported: Mutex<bool>,
}

impl TransferSlot {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reported: Mutex::new(false),
        }
    }

    /// Run `report` unless an outcome was already reported
    ///
    /// The lock is held across the callback, so once one side has reported the
    /// other can neither report nor return before that report was delivered.
    fn report(&self, report: impl FnOnce()) -> bool {
        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        if *reported {
            return false;
        }
        *reported = true;
        report();
        true
    }
}

/// HTTP transfer engine
///
/// Each transfer downloads into its own file under `<temp_dir>/engine`, reports
/// `finished` (with the HTTP status) or `failed` to the sink, then deletes the
/// file. When the last in-flight transfer ends the engine reports
/// `batch_drained`.
///
/// Cancelling reports `failed` for the transfer before `cancel` returns and
/// frees the identity at once, so it can be begun again immediately.
pub struct HttpTransferEngine {
    client: reqwest::Client,
    sink: Arc<dyn TransferEventSink>,
    work_dir: PathBuf,
    begin_delay: Option<Duration>,
    active: ActiveTransfers,
    next_file: AtomicU64,
}

impl HttpTransferEngine {
    /// Create an engine reporting to `sink`
    pub fn new(session: &SessionConfig, sink: Arc<dyn TransferEventSink>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = session.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        tracing::info!(
            session = %session.identifier,
            discretionary = session.discretionary,
            sends_launch_events = session.sends_launch_events,
            begin_delay_secs = session.begin_delay.map(|d| d.as_secs()),
            "HTTP transfer engine initialized"
        );

        Ok(Self {
            client,
            sink,
            work_dir: session.temp_dir.join("engine"),
            begin_delay: session.begin_delay,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_file: AtomicU64::new(0),
        })
    }

    /// Number of transfers currently in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.active).len()
    }
}

#[async_trait]
impl TransferEngine for HttpTransferEngine {
    async fn begin(&self, id: &RequestId, source: &Url) -> Result<()> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let slot = Arc::new(TransferSlot::new());
        {
            let mut active = lock(&self.active);
            if active.contains_key(id) {
                return Err(Error::Engine(format!("transfer {} is already in flight", id)));
            }
            active.insert(id.clone(), Arc::clone(&slot));
        }

        let file = self.work_dir.join(format!(
            "{}.download",
            self.next_file.fetch_add(1, Ordering::Relaxed)
        ));

        let transfer = Transfer {
            client: self.client.clone(),
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&self.active),
            begin_delay: self.begin_delay,
            id: id.clone(),
            source: source.clone(),
            file,
            slot,
        };
        tokio::spawn(transfer.run());

        tracing::debug!(identity = %id, "transfer started");
        Ok(())
    }

    async fn cancel(&self, id: &RequestId) -> Result<()> {
        let Some(slot) = lock(&self.active).remove(id) else {
            return Ok(());
        };

        tracing::debug!(identity = %id, "cancelling transfer");
        slot.token.cancel();
        slot.report(|| self.sink.failed(id.clone(), "transfer cancelled".to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// A single in-flight transfer
struct Transfer {
    client: reqwest::Client,
    sink: Arc<dyn TransferEventSink>,
    active: ActiveTransfers,
    begin_delay: Option<Duration>,
    id: RequestId,
    source: Url,
    file: PathBuf,
    slot: Arc<TransferSlot>,
}

impl Transfer {
    async fn run(self) {
        let outcome = tokio::select! {
            // Reported by `cancel`
            _ = self.slot.token.cancelled() => None,
            result = self.fetch() => Some(result),
        };

        if let Some(outcome) = outcome {
            self.slot.report(|| match outcome {
                Ok(status) => {
                    tracing::info!(identity = %self.id, status, "transfer finished");
                    self.sink.finished(
                        TaskInfo::new(self.id.clone(), Some(ResponseInfo { status })),
                        &self.file,
                    );
                }
                Err(error) => {
                    tracing::info!(identity = %self.id, error = %error, "transfer failed");
                    self.sink.failed(self.id.clone(), error);
                }
            });
        }

        // The payload is only guaranteed to exist for the duration of the callback
        if let Err(e) = tokio::fs::remove_file(&self.file).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(identity = %self.id, error = %e, "failed to remove engine temp file");
        }

        let idle = {
            let mut active = lock(&self.active);
            // A cancelled transfer's slot may already belong to a newer one
            if active
                .get(&self.id)
                .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
            {
                active.remove(&self.id);
            }
            active.is_empty()
        };
        if idle {
            self.sink.batch_drained();
        }
    }

    async fn fetch(&self) -> std::result::Result<u16, String> {
        if let Some(delay) = self.begin_delay {
            tokio::time::sleep(delay).await;
        }

        let mut response = self
            .client
            .get(self.source.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();

        let mut file = tokio::fs::File::create(&self.file)
            .await
            .map_err(|e| e.to_string())?;
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        }
        file.flush().await.map_err(|e| e.to_string())?;

        Ok(status)
    }
}
