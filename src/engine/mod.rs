//! Transfer engine seam
//!
//! The coordinator never moves bytes itself. It drives an external
//! [`TransferEngine`] and receives its events through a [`TransferEventSink`],
//! which the [`EventRouter`](crate::router::EventRouter) implements. Feeding a
//! sink synthetic events is enough to exercise the whole reconciliation path.
//!
//! - [`HttpTransferEngine`]: reqwest-backed reference engine

mod http;
mod traits;

pub use http::HttpTransferEngine;
pub use traits::{TransferEngine, TransferEventSink};
