//! In-memory durable store for tests and hosts that do not need restart survival

use super::traits::DurableStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// [`DurableStore`] kept in process memory
///
/// Nothing survives the process. Useful in tests, and for hosts that only need
/// same-process completion. Clones of the inner map can be handed to a second
/// coordinator through [`MemoryStore::snapshot`] to simulate a relaunch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }

    /// Copy of every entry currently stored
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries().clone()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    async fn keys(&self) -> crate::Result<Vec<String>> {
        Ok(self.entries().keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
