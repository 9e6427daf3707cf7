//! # Sync Queue Repository
//!
//! Persistence for the `sync_queue` table. Queue entries make a
//! reconciliation pass resumable: records whose entry is already completed
//! are skipped when an interrupted pass is retried, and the queue is cleared
//! once a pass runs to completion.

use crate::error::{CacheError, Result};
use crate::models::{QueueEntryId, QueueOperation, QueueStatus, SyncQueueEntry};
use async_trait::async_trait;
use bridge_traits::remote::RecipeId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;

/// Repository trait for sync queue persistence
#[async_trait]
pub trait SyncQueueRepository: Send + Sync {
    /// Return the existing pending/failed entry for `(remote_id, operation)`
    /// or insert a fresh pending one.
    async fn ensure_pending(
        &self,
        remote_id: &RecipeId,
        operation: QueueOperation,
        now: DateTime<Utc>,
    ) -> Result<SyncQueueEntry>;

    /// Mark an entry completed.
    async fn mark_completed(&self, id: &QueueEntryId, now: DateTime<Utc>) -> Result<()>;

    /// Mark an entry failed, recording the failure reason.
    async fn mark_failed(
        &self,
        id: &QueueEntryId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Remote ids whose entries are completed (work already done by an
    /// interrupted pass).
    async fn completed_remote_ids(&self) -> Result<HashSet<String>>;

    /// Pending and failed entries, oldest first.
    async fn find_unfinished(&self) -> Result<Vec<SyncQueueEntry>>;

    /// Drop all completed entries; returns how many went.
    async fn clear_completed(&self) -> Result<u64>;
}

/// SQLite implementation of [`SyncQueueRepository`]
pub struct SqliteSyncQueueRepository {
    pool: SqlitePool,
}

impl SqliteSyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SyncQueueRow {
    id: String,
    remote_id: String,
    operation: String,
    status: String,
    error_message: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SyncQueueRow> for SyncQueueEntry {
    type Error = CacheError;

    fn try_from(row: SyncQueueRow) -> Result<Self> {
        let created_at = DateTime::from_timestamp_millis(row.created_at).ok_or_else(|| {
            CacheError::InvalidRecord(format!("Out-of-range created_at: {}", row.created_at))
        })?;
        let updated_at = DateTime::from_timestamp_millis(row.updated_at).ok_or_else(|| {
            CacheError::InvalidRecord(format!("Out-of-range updated_at: {}", row.updated_at))
        })?;

        Ok(SyncQueueEntry {
            id: QueueEntryId::from_string(&row.id)?,
            remote_id: RecipeId::new(row.remote_id),
            operation: row.operation.parse()?,
            status: row.status.parse()?,
            error_message: row.error_message,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl SyncQueueRepository for SqliteSyncQueueRepository {
    async fn ensure_pending(
        &self,
        remote_id: &RecipeId,
        operation: QueueOperation,
        now: DateTime<Utc>,
    ) -> Result<SyncQueueEntry> {
        let existing = sqlx::query_as::<_, SyncQueueRow>(
            r#"
            SELECT * FROM sync_queue
            WHERE remote_id = ? AND operation = ? AND status IN ('pending', 'failed')
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(remote_id.as_str())
        .bind(operation.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return SyncQueueEntry::try_from(row);
        }

        let entry = SyncQueueEntry {
            id: QueueEntryId::new(),
            remote_id: remote_id.clone(),
            operation,
            status: QueueStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sync_queue (id, remote_id, operation, status, error_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(entry.id.as_str())
        .bind(entry.remote_id.as_str())
        .bind(entry.operation.as_str())
        .bind(entry.status.as_str())
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn mark_completed(&self, id: &QueueEntryId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'completed', error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now.timestamp_millis())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &QueueEntryId,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'failed', error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(message)
        .bind(now.timestamp_millis())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn completed_remote_ids(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT remote_id FROM sync_queue WHERE status = 'completed'")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn find_unfinished(&self) -> Result<Vec<SyncQueueEntry>> {
        let rows = sqlx::query_as::<_, SyncQueueRow>(
            r#"
            SELECT * FROM sync_queue
            WHERE status IN ('pending', 'failed')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncQueueEntry::try_from).collect()
    }

    async fn clear_completed(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE status = 'completed'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use chrono::TimeZone;

    async fn repo() -> SqliteSyncQueueRepository {
        SqliteSyncQueueRepository::new(create_test_pool().await.unwrap())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_pending_dedupes() {
        let repo = repo().await;
        let id = RecipeId::new("r1");

        let first = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();
        let second = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);

        let unfinished = repo.find_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_lifecycle() {
        let repo = repo().await;
        let id = RecipeId::new("r1");

        let entry = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();
        repo.mark_completed(&entry.id, t0()).await.unwrap();

        let completed = repo.completed_remote_ids().await.unwrap();
        assert!(completed.contains("r1"));
        assert!(repo.find_unfinished().await.unwrap().is_empty());

        // A completed entry no longer dedupes a new pending one
        let fresh = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();
        assert_ne!(fresh.id, entry.id);

        assert_eq!(repo.clear_completed().await.unwrap(), 1);
        assert!(repo.completed_remote_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_entries_are_retried() {
        let repo = repo().await;
        let id = RecipeId::new("r1");

        let entry = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();
        repo.mark_failed(&entry.id, "connection refused", t0())
            .await
            .unwrap();

        // A failed entry is reused, not duplicated
        let retried = repo
            .ensure_pending(&id, QueueOperation::Download, t0())
            .await
            .unwrap();
        assert_eq!(retried.id, entry.id);
        assert_eq!(retried.status, QueueStatus::Failed);
        assert_eq!(retried.error_message.as_deref(), Some("connection refused"));
    }
}
