//! # Metadata Repository
//!
//! Flat key-to-value scalar store for process-wide bookkeeping, principally
//! the `last_sync_at` stamp the reconciliation engine writes after every
//! sweep.

use crate::error::{CacheError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Metadata key for the last reconciliation stamp.
pub const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Repository trait for scalar metadata
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Get a scalar value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set (upsert) a scalar value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// When the last reconciliation sweep finished, if ever.
    async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        match self.get(LAST_SYNC_AT_KEY).await? {
            Some(value) => {
                let parsed = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                    CacheError::InvalidRecord(format!("Invalid last_sync_at {value:?}: {e}"))
                })?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    /// Record when a reconciliation sweep finished.
    async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.set(LAST_SYNC_AT_KEY, &at.to_rfc3339()).await
    }
}

/// SQLite implementation of [`MetadataRepository`]
pub struct SqliteMetadataRepository {
    pool: SqlitePool,
}

impl SqliteMetadataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
