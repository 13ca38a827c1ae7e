//! Request store: durable destinations plus in-memory waiters
//!
//! The durable table (identity → destination) lives in an injected
//! [`DurableStore`] and is the only source of truth for whether a request still
//! exists. The volatile table (identity → [`Waiter`]) only lives as long as the
//! process and is lost on restart.
//!
//! Every operation runs inside one critical section guarded by an async mutex,
//! so a request is never partially visible and two reconciliation jobs for the
//! same identity can never both claim it. File moves never happen under this
//! lock.

use super::traits::DurableStore;
use crate::error::{Error, Result};
use crate::types::{DurableRecord, RequestId};
use crate::waiter::{TransferOutcome, Waiter};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What the store currently records for an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    /// Durable destination; `None` means the request is unknown
    pub destination: Option<PathBuf>,
    /// Whether a waiter from this process is attached
    pub waiter_attached: bool,
    /// Whether a reconciliation job has claimed the request
    pub reconciling: bool,
}

/// A request claimed for reconciliation
///
/// Holding a claim is the only way to resolve a request's waiter. Other claims
/// for the same identity fail until the entry is removed.
#[derive(Debug)]
pub struct Claim {
    id: RequestId,
    destination: PathBuf,
    waiter: Option<Waiter>,
}

impl Claim {
    /// Identity of the claimed request
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Durable destination of the claimed request
    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    /// Whether a waiter from this process is attached
    pub fn has_waiter(&self) -> bool {
        self.waiter.is_some()
    }

    /// Resolve the waiter, if any, consuming the claim
    ///
    /// Returns `true` if a caller in this process received the outcome.
    pub fn resolve(self, outcome: TransferOutcome) -> bool {
        match self.waiter {
            Some(waiter) => waiter.resolve(outcome),
            None => {
                tracing::info!(
                    identity = %self.id,
                    "no waiter attached for request (scheduled by a previous process)"
                );
                false
            }
        }
    }
}

#[derive(Default)]
struct VolatileTable {
    waiters: HashMap<RequestId, Waiter>,
    reconciling: HashSet<RequestId>,
}

/// Concurrency-safe combination of the durable and volatile tables
pub struct RequestStore {
    durable: Arc<dyn DurableStore>,
    volatile: Mutex<VolatileTable>,
}

impl RequestStore {
    /// Create a request store over a durable backend
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            durable,
            volatile: Mutex::new(VolatileTable::default()),
        }
    }

    /// Name of the durable backend
    pub fn backend(&self) -> &'static str {
        self.durable.name()
    }

    /// Record `destination` and `waiter` for `id`, replacing anything recorded
    ///
    /// A replaced waiter is dropped, which resolves its handle as abandoned.
    pub async fn put(&self, id: &RequestId, destination: &Path, waiter: Waiter) -> Result<()> {
        let mut table = self.volatile.lock().await;
        self.durable
            .set(id.as_str(), &destination.to_string_lossy())
            .await?;
        table.reconciling.remove(id);
        table.waiters.insert(id.clone(), waiter);
        tracing::debug!(identity = %id, ?destination, "request stored");
        Ok(())
    }

    /// Record a new request, refusing if the identity is already outstanding
    ///
    /// Outstanding means a durable record exists, a waiter is attached, or a
    /// job is reconciling the identity.
    pub async fn insert_new(
        &self,
        id: &RequestId,
        destination: &Path,
        waiter: Waiter,
    ) -> Result<()> {
        let mut table = self.volatile.lock().await;
        if table.reconciling.contains(id)
            || table.waiters.contains_key(id)
            || self.durable.get(id.as_str()).await?.is_some()
        {
            return Err(Error::Duplicate(format!(
                "a request for {} is already outstanding",
                id
            )));
        }
        self.durable
            .set(id.as_str(), &destination.to_string_lossy())
            .await?;
        table.waiters.insert(id.clone(), waiter);
        tracing::debug!(identity = %id, ?destination, "request stored");
        Ok(())
    }

    /// What is currently recorded for `id`
    pub async fn get(&self, id: &RequestId) -> Result<StoredRequest> {
        let table = self.volatile.lock().await;
        let destination = self.durable.get(id.as_str()).await?.map(PathBuf::from);
        Ok(StoredRequest {
            destination,
            waiter_attached: table.waiters.contains_key(id),
            reconciling: table.reconciling.contains(id),
        })
    }

    /// Claim `id` for reconciliation
    ///
    /// Takes the waiter out of the volatile table and marks the identity as
    /// reconciling. Returns `None` when there is no durable record or another
    /// job already holds the claim.
    pub async fn claim(&self, id: &RequestId) -> Result<Option<Claim>> {
        let mut table = self.volatile.lock().await;
        if table.reconciling.contains(id) {
            tracing::debug!(identity = %id, "request already claimed");
            return Ok(None);
        }
        let Some(destination) = self.durable.get(id.as_str()).await? else {
            return Ok(None);
        };
        table.reconciling.insert(id.clone());
        let waiter = table.waiters.remove(id);
        Ok(Some(Claim {
            id: id.clone(),
            destination: PathBuf::from(destination),
            waiter,
        }))
    }

    /// Take the waiter for `id` without consulting the durable table
    ///
    /// Lets a job answer the caller when the durable backend cannot be read.
    /// Returns `None` when no waiter is attached or another job holds the claim.
    pub async fn take_waiter(&self, id: &RequestId) -> Option<Waiter> {
        let mut table = self.volatile.lock().await;
        if table.reconciling.contains(id) {
            return None;
        }
        table.waiters.remove(id)
    }

    /// Attach a fresh waiter to a request recorded by an earlier process
    pub async fn attach(&self, id: &RequestId, waiter: Waiter) -> Result<PathBuf> {
        let mut table = self.volatile.lock().await;
        let Some(destination) = self.durable.get(id.as_str()).await? else {
            return Err(Error::NotFound(id.to_string()));
        };
        if table.reconciling.contains(id) || table.waiters.contains_key(id) {
            return Err(Error::Duplicate(format!(
                "request {} already has a waiter or is reconciling",
                id
            )));
        }
        table.waiters.insert(id.clone(), waiter);
        Ok(PathBuf::from(destination))
    }

    /// Delete everything recorded for `id`; removing an absent identity is a no-op
    pub async fn remove(&self, id: &RequestId) -> Result<()> {
        let mut table = self.volatile.lock().await;
        let deleted = self.durable.delete(id.as_str()).await;
        table.waiters.remove(id);
        table.reconciling.remove(id);
        deleted?;
        tracing::debug!(identity = %id, "request removed");
        Ok(())
    }

    /// Durable records currently stored
    pub async fn records(&self) -> Result<Vec<DurableRecord>> {
        let _table = self.volatile.lock().await;
        let mut records = Vec::new();
        for key in self.durable.keys().await? {
            if let Some(destination) = self.durable.get(&key).await? {
                records.push(DurableRecord {
                    id: RequestId::new(key),
                    destination: PathBuf::from(destination),
                });
            }
        }
        Ok(records)
    }
}
