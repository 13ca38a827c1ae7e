//! SQLite-backed durable store

use super::traits::DurableStore;
use crate::db::Database;
use async_trait::async_trait;

#[async_trait]
impl DurableStore for Database {
    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        self.upsert_transfer_record(key, value).await
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self
            .get_transfer_record(key)
            .await?
            .map(|record| record.destination))
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        self.delete_transfer_record(key).await?;
        Ok(())
    }

    async fn keys(&self) -> crate::Result<Vec<String>> {
        Ok(self
            .list_transfer_records()
            .await?
            .into_iter()
            .map(|record| record.identity)
            .collect())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn database_implements_durable_store() {
        let temp_file = NamedTempFile::new().unwrap();
        let db = Database::new(temp_file.path()).await.unwrap();
        let store: &dyn DurableStore = &db;

        store.set("https://example.com/a", "/tmp/a").await.unwrap();
        assert_eq!(
            store.get("https://example.com/a").await.unwrap().as_deref(),
            Some("/tmp/a")
        );
        assert_eq!(store.keys().await.unwrap(), vec!["https://example.com/a"]);

        store.delete("https://example.com/a").await.unwrap();
        store.delete("https://example.com/a").await.unwrap();
        assert!(store.get("https://example.com/a").await.unwrap().is_none());
        assert_eq!(store.name(), "sqlite");

        db.close().await;
    }
}
