//! Core types for background-dl

use crate::error::TransferError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Canonical identity of a transfer request
///
/// Derived from the transfer's source URL rendered as a string. The same identity
/// keys the durable record, the in-memory waiter, the tracked job and every event
/// the engine delivers for the transfer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create an identity from an already-rendered key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the identity of a transfer from its source URL
    pub fn from_source(source: &Url) -> Self {
        Self(source.as_str().to_string())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Url> for RequestId {
    fn from(source: &Url) -> Self {
        Self::from_source(source)
    }
}

impl From<&str> for RequestId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response metadata observed by the transfer engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    /// HTTP status code
    pub status: u16,
}

impl ResponseInfo {
    /// Whether this response counts as a successful transfer (HTTP 200 only)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Engine-side description of the task an event belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    /// Identity the transfer was started with
    pub id: RequestId,
    /// Terminal response, if the engine received one
    pub response: Option<ResponseInfo>,
}

impl TaskInfo {
    /// Create task info for an identity with a terminal response
    pub fn new(id: impl Into<RequestId>, response: Option<ResponseInfo>) -> Self {
        Self {
            id: id.into(),
            response,
        }
    }

    /// Whether the engine reported a successful terminal status
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.response.is_some_and(|r| r.is_success())
    }
}

/// Event delivered by the external transfer engine
#[derive(Clone, Debug)]
pub enum TransferEvent {
    /// The transfer finished and its payload sits at `temp_location`
    ///
    /// The engine only guarantees `temp_location` exists for the duration of the
    /// callback that delivers this event.
    Finished {
        /// Task the event belongs to
        task: TaskInfo,
        /// Engine-owned temporary file holding the payload
        temp_location: PathBuf,
    },
    /// The transfer failed before completion (transport/client side)
    Failed {
        /// Identity of the failed transfer
        id: RequestId,
        /// Rendered transport error
        error: String,
    },
    /// No further events are pending for the current wake cycle
    BatchDrained,
}

/// Per-request lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Durable record and waiter written
    Scheduled,
    /// Engine has been asked to begin the transfer
    AwaitingEvent,
    /// A tracked job has claimed the request and is reconciling it
    Reconciling,
    /// Waiter fulfilled and store entry removed
    Resolved,
    /// An event arrived with no matching durable record
    Orphaned,
}

/// Which engine event an orphaned reconciliation came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A `Finished` event
    Finished,
    /// A `Failed` event
    Failed,
}

/// Lifecycle event broadcast to subscribers
///
/// A relaunched process whose waiters were lost can still learn the outcome of a
/// request by watching for its identity here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A request was recorded and handed to the engine
    Scheduled {
        /// Request identity
        id: RequestId,
        /// Where the artifact will be placed
        destination: PathBuf,
    },

    /// A request completed and its artifact is in place
    Completed {
        /// Request identity
        id: RequestId,
        /// Final location of the artifact
        location: PathBuf,
    },

    /// A request reached a failed terminal outcome
    Failed {
        /// Request identity
        id: RequestId,
        /// The terminal failure
        error: TransferError,
    },

    /// A request was cancelled by the caller
    Cancelled {
        /// Request identity
        id: RequestId,
    },

    /// An event arrived for an identity with no durable record
    Orphaned {
        /// Identity named by the event
        id: RequestId,
        /// Which engine event it was
        kind: EventKind,
    },

    /// All jobs tracked when a batch drained have finished
    Drained {
        /// Number of jobs waited on
        jobs: usize,
        /// Whether the wait hit the drain timeout
        timed_out: bool,
    },

    /// The coordinator shut down
    Shutdown,
}

/// Durable record recovered from the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurableRecord {
    /// Request identity
    pub id: RequestId,
    /// Destination the artifact will be moved to
    pub destination: PathBuf,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_the_rendered_source_url() {
        let source = Url::parse("https://example.com/cats/1.jpg?size=large").unwrap();
        let id = RequestId::from(&source);
        assert_eq!(id.as_str(), "https://example.com/cats/1.jpg?size=large");
        assert_eq!(id.to_string(), source.as_str());
    }

    #[test]
    fn only_http_200_is_success() {
        assert!(TaskInfo::new("a", Some(ResponseInfo { status: 200 })).succeeded());
        assert!(!TaskInfo::new("a", Some(ResponseInfo { status: 204 })).succeeded());
        assert!(!TaskInfo::new("a", Some(ResponseInfo { status: 500 })).succeeded());
        assert!(!TaskInfo::new("a", None).succeeded());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Orphaned {
            id: RequestId::new("https://example.com/x"),
            kind: EventKind::Failed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "orphaned");
        assert_eq!(json["id"], "https://example.com/x");
        assert_eq!(json["kind"], "failed");
    }
}
