//! Trait for the durable key-value store

use async_trait::async_trait;

/// Durable key → value store backing the request store
///
/// Keys are request identities and values are destination paths. A successful
/// `set` must survive the process being terminated immediately afterwards.
///
/// # Examples
///
/// ```
/// use background_dl::store::{DurableStore, MemoryStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.set("https://example.com/cat.jpg", "/downloads/cat.jpg").await?;
/// assert_eq!(
///     store.get("https://example.com/cat.jpg").await?.as_deref(),
///     Some("/downloads/cat.jpg")
/// );
///
/// store.delete("https://example.com/cat.jpg").await?;
/// store.delete("https://example.com/cat.jpg").await?; // idempotent
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Delete `key`; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> crate::Result<()>;

    /// All keys currently stored
    async fn keys(&self) -> crate::Result<Vec<String>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
