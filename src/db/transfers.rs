//! Durable identity → destination records.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, TransferRecord};

impl Database {
    /// Insert or replace the destination recorded for an identity
    pub async fn upsert_transfer_record(&self, identity: &str, destination: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO transfer_records (identity, destination, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET destination = excluded.destination, created_at = excluded.created_at
            "#,
        )
        .bind(identity)
        .bind(destination)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to store transfer record: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get the record for an identity
    pub async fn get_transfer_record(&self, identity: &str) -> Result<Option<TransferRecord>> {
        let row = sqlx::query_as::<_, TransferRecord>(
            r#"
            SELECT identity, destination, created_at
            FROM transfer_records
            WHERE identity = ?
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get transfer record: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Delete the record for an identity
    ///
    /// Returns whether a record was deleted; deleting an absent identity is not an error.
    pub async fn delete_transfer_record(&self, identity: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transfer_records WHERE identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete transfer record: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// List all records, oldest first
    pub async fn list_transfer_records(&self) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query_as::<_, TransferRecord>(
            r#"
            SELECT identity, destination, created_at
            FROM transfer_records
            ORDER BY created_at ASC, identity ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list transfer records: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
