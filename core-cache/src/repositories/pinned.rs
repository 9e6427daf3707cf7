//! # Pinned Record Repository
//!
//! Persistence for the `pinned_records` table: the durable local copies of
//! remote recipes plus their offline metadata.

use crate::error::{CacheError, Result};
use crate::models::{LocalKey, PinnedRecord, SyncStatus};
use async_trait::async_trait;
use bridge_traits::remote::RecipeId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for pinned record persistence
#[async_trait]
pub trait PinnedRecordRepository: Send + Sync {
    /// Insert a new pinned record.
    async fn insert(&self, record: &PinnedRecord) -> Result<()>;

    /// Update an existing pinned record (matched by `local_key`).
    async fn update(&self, record: &PinnedRecord) -> Result<()>;

    /// Find the active pin for a remote id.
    async fn find_by_remote_id(&self, remote_id: &RecipeId) -> Result<Option<PinnedRecord>>;

    /// All pinned records, most recently accessed first.
    async fn find_all(&self) -> Result<Vec<PinnedRecord>>;

    /// All pinned records with a given sync status.
    async fn find_by_status(&self, status: SyncStatus) -> Result<Vec<PinnedRecord>>;

    /// Whether a pin exists for the remote id.
    async fn exists(&self, remote_id: &RecipeId) -> Result<bool>;

    /// Record an access: advance `last_accessed_at` and increment
    /// `access_count`, returning the updated record. `None` when absent.
    async fn record_access(
        &self,
        remote_id: &RecipeId,
        at: DateTime<Utc>,
    ) -> Result<Option<PinnedRecord>>;

    /// Set the sync status (and last failure reason) of a pin.
    ///
    /// Returns false when no pin exists for the remote id.
    async fn set_sync_status(
        &self,
        remote_id: &RecipeId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool>;

    /// Mark whether the primary image asset is confirmed cached.
    async fn set_has_asset(&self, remote_id: &RecipeId, has_asset: bool) -> Result<bool>;

    /// Delete a pin together with its cached assets and any queue entries, in
    /// one transaction. Partial deletion is never observable.
    ///
    /// Returns false when no pin existed (idempotent removal).
    async fn delete_with_assets(&self, remote_id: &RecipeId) -> Result<bool>;

    /// All pinned records in eviction order: least accessed first, oldest
    /// touch breaking ties.
    async fn eviction_order(&self) -> Result<Vec<PinnedRecord>>;

    /// Aggregate usage: `(record count, total storage bytes)`.
    async fn usage(&self) -> Result<(u32, i64)>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`PinnedRecordRepository`]
pub struct SqlitePinnedRecordRepository {
    pool: SqlitePool,
}

impl SqlitePinnedRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a pinned record
#[derive(Debug, FromRow)]
struct PinnedRecordRow {
    local_key: String,
    remote_id: String,
    title: String,
    description: Option<String>,
    ingredients: String,
    instructions: String,
    image_url: Option<String>,
    created_at: i64,
    updated_at: Option<i64>,
    pinned_at: i64,
    last_accessed_at: i64,
    sync_status: String,
    sync_error: Option<String>,
    sync_version: i64,
    storage_bytes: i64,
    has_asset: i64,
    access_count: i64,
}

fn millis_to_datetime(millis: i64, column: &str) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| CacheError::InvalidRecord(format!("Out-of-range {column}: {millis}")))
}

impl TryFrom<PinnedRecordRow> for PinnedRecord {
    type Error = CacheError;

    fn try_from(row: PinnedRecordRow) -> Result<Self> {
        let ingredients: Vec<String> = serde_json::from_str(&row.ingredients)
            .map_err(|e| CacheError::InvalidRecord(format!("Invalid ingredients JSON: {e}")))?;
        let instructions: Vec<String> = serde_json::from_str(&row.instructions)
            .map_err(|e| CacheError::InvalidRecord(format!("Invalid instructions JSON: {e}")))?;

        Ok(PinnedRecord {
            local_key: LocalKey::from_string(&row.local_key)?,
            remote_id: RecipeId::new(row.remote_id),
            title: row.title,
            description: row.description,
            ingredients,
            instructions,
            image_url: row.image_url,
            created_at: millis_to_datetime(row.created_at, "created_at")?,
            updated_at: row
                .updated_at
                .map(|m| millis_to_datetime(m, "updated_at"))
                .transpose()?,
            pinned_at: millis_to_datetime(row.pinned_at, "pinned_at")?,
            last_accessed_at: millis_to_datetime(row.last_accessed_at, "last_accessed_at")?,
            sync_status: row.sync_status.parse()?,
            sync_error: row.sync_error,
            sync_version: row.sync_version,
            storage_bytes: row.storage_bytes,
            has_asset: row.has_asset != 0,
            access_count: row.access_count,
        })
    }
}

fn rows_to_records(rows: Vec<PinnedRecordRow>) -> Result<Vec<PinnedRecord>> {
    rows.into_iter().map(PinnedRecord::try_from).collect()
}

#[async_trait]
impl PinnedRecordRepository for SqlitePinnedRecordRepository {
    async fn insert(&self, record: &PinnedRecord) -> Result<()> {
        let ingredients = serde_json::to_string(&record.ingredients)
            .map_err(|e| CacheError::InvalidRecord(e.to_string()))?;
        let instructions = serde_json::to_string(&record.instructions)
            .map_err(|e| CacheError::InvalidRecord(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO pinned_records (
                local_key, remote_id, title, description,
                ingredients, instructions, image_url,
                created_at, updated_at, pinned_at, last_accessed_at,
                sync_status, sync_error, sync_version,
                storage_bytes, has_asset, access_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.local_key.as_str())
        .bind(record.remote_id.as_str())
        .bind(&record.title)
        .bind(&record.description)
        .bind(ingredients)
        .bind(instructions)
        .bind(&record.image_url)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.map(|t| t.timestamp_millis()))
        .bind(record.pinned_at.timestamp_millis())
        .bind(record.last_accessed_at.timestamp_millis())
        .bind(record.sync_status.as_str())
        .bind(&record.sync_error)
        .bind(record.sync_version)
        .bind(record.storage_bytes)
        .bind(record.has_asset as i64)
        .bind(record.access_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, record: &PinnedRecord) -> Result<()> {
        let ingredients = serde_json::to_string(&record.ingredients)
            .map_err(|e| CacheError::InvalidRecord(e.to_string()))?;
        let instructions = serde_json::to_string(&record.instructions)
            .map_err(|e| CacheError::InvalidRecord(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE pinned_records SET
                remote_id = ?, title = ?, description = ?,
                ingredients = ?, instructions = ?, image_url = ?,
                created_at = ?, updated_at = ?, pinned_at = ?, last_accessed_at = ?,
                sync_status = ?, sync_error = ?, sync_version = ?,
                storage_bytes = ?, has_asset = ?, access_count = ?
            WHERE local_key = ?
            "#,
        )
        .bind(record.remote_id.as_str())
        .bind(&record.title)
        .bind(&record.description)
        .bind(ingredients)
        .bind(instructions)
        .bind(&record.image_url)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.map(|t| t.timestamp_millis()))
        .bind(record.pinned_at.timestamp_millis())
        .bind(record.last_accessed_at.timestamp_millis())
        .bind(record.sync_status.as_str())
        .bind(&record.sync_error)
        .bind(record.sync_version)
        .bind(record.storage_bytes)
        .bind(record.has_asset as i64)
        .bind(record.access_count)
        .bind(record.local_key.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound {
                remote_id: record.remote_id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_remote_id(&self, remote_id: &RecipeId) -> Result<Option<PinnedRecord>> {
        let row = sqlx::query_as::<_, PinnedRecordRow>(
            "SELECT * FROM pinned_records WHERE remote_id = ?",
        )
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PinnedRecord::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<PinnedRecord>> {
        let rows = sqlx::query_as::<_, PinnedRecordRow>(
            "SELECT * FROM pinned_records ORDER BY last_accessed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows_to_records(rows)
    }

    async fn find_by_status(&self, status: SyncStatus) -> Result<Vec<PinnedRecord>> {
        let rows = sqlx::query_as::<_, PinnedRecordRow>(
            "SELECT * FROM pinned_records WHERE sync_status = ? ORDER BY last_accessed_at DESC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows_to_records(rows)
    }

    async fn exists(&self, remote_id: &RecipeId) -> Result<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pinned_records WHERE remote_id = ?")
                .bind(remote_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(row.0 > 0)
    }

    async fn record_access(
        &self,
        remote_id: &RecipeId,
        at: DateTime<Utc>,
    ) -> Result<Option<PinnedRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE pinned_records
            SET last_accessed_at = ?, access_count = access_count + 1
            WHERE remote_id = ?
            "#,
        )
        .bind(at.timestamp_millis())
        .bind(remote_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_remote_id(remote_id).await
    }

    async fn set_sync_status(
        &self,
        remote_id: &RecipeId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE pinned_records SET sync_status = ?, sync_error = ? WHERE remote_id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(remote_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_has_asset(&self, remote_id: &RecipeId, has_asset: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE pinned_records SET has_asset = ? WHERE remote_id = ?")
            .bind(has_asset as i64)
            .bind(remote_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_with_assets(&self, remote_id: &RecipeId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cached_assets WHERE remote_id = ?")
            .bind(remote_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sync_queue WHERE remote_id = ?")
            .bind(remote_id.as_str())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM pinned_records WHERE remote_id = ?")
            .bind(remote_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn eviction_order(&self) -> Result<Vec<PinnedRecord>> {
        let rows = sqlx::query_as::<_, PinnedRecordRow>(
            "SELECT * FROM pinned_records ORDER BY access_count ASC, last_accessed_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows_to_records(rows)
    }

    async fn usage(&self) -> Result<(u32, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(storage_bytes), 0) FROM pinned_records",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.0 as u32, row.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use bridge_traits::remote::RemoteRecipe;
    use chrono::TimeZone;

    fn remote(id: &str) -> RemoteRecipe {
        RemoteRecipe {
            id: RecipeId::new(id),
            title: format!("Recipe {id}"),
            description: None,
            ingredients: vec!["a".to_string()],
            instructions: vec!["b".to_string()],
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn pin(id: &str, at: DateTime<Utc>) -> PinnedRecord {
        PinnedRecord::from_remote(&remote(id), at, 100)
    }

    async fn repo() -> SqlitePinnedRecordRepository {
        SqlitePinnedRecordRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let repo = repo().await;
        let record = pin("r1", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        repo.insert(&record).await.unwrap();
        let found = repo
            .find_by_remote_id(&RecipeId::new("r1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn test_record_access_increments() {
        let repo = repo().await;
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        repo.insert(&pin("r1", t0)).await.unwrap();

        let touched = repo
            .record_access(&RecipeId::new("r1"), t1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(touched.access_count, 1);
        assert_eq!(touched.last_accessed_at, t1);

        let absent = repo.record_access(&RecipeId::new("nope"), t1).await.unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_delete_with_assets_is_atomic_and_idempotent() {
        let repo = repo().await;
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        repo.insert(&pin("r1", t0)).await.unwrap();

        sqlx::query(
            "INSERT INTO cached_assets (url, remote_id, data, size_bytes, cached_at)
             VALUES ('u1', 'r1', x'00', 1, 0)",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        assert!(repo.delete_with_assets(&RecipeId::new("r1")).await.unwrap());

        let assets: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cached_assets")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(assets.0, 0);

        // Second delete succeeds silently
        assert!(!repo.delete_with_assets(&RecipeId::new("r1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_eviction_order_least_used_then_oldest() {
        let repo = repo().await;
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut a = pin("a", old);
        a.access_count = 5;
        let mut b = pin("b", recent);
        b.access_count = 1;
        let mut c = pin("c", old);
        c.access_count = 1;

        for r in [&a, &b, &c] {
            repo.insert(r).await.unwrap();
        }

        let order: Vec<String> = repo
            .eviction_order()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.remote_id.to_string())
            .collect();

        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_usage_aggregate() {
        let repo = repo().await;
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        repo.insert(&pin("r1", t0)).await.unwrap();
        repo.insert(&pin("r2", t0)).await.unwrap();

        let (count, bytes) = repo.usage().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(bytes, 200);
    }
}
