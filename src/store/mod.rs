//! Request persistence
//!
//! The core abstraction is the [`DurableStore`] trait, the external key-value
//! store that keeps identity → destination records across process restarts.
//! Implementations provided:
//!
//! - [`Database`](crate::db::Database): SQLite, survives restarts
//! - [`MemoryStore`]: process memory only
//!
//! [`RequestStore`] combines a durable store with the in-memory waiter table.

mod memory;
mod request_store;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use request_store::{Claim, RequestStore, StoredRequest};
pub use traits::DurableStore;
