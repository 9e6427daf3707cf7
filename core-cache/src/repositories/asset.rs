//! # Cached Asset Repository
//!
//! Persistence for the `cached_assets` table: opaque image blobs keyed by
//! source URL, each owned by a pinned record.

use crate::error::{CacheError, Result};
use crate::models::CachedAsset;
use async_trait::async_trait;
use bridge_traits::remote::RecipeId;
use chrono::DateTime;
use sqlx::{FromRow, SqlitePool};

/// Repository trait for cached asset persistence
#[async_trait]
pub trait CachedAssetRepository: Send + Sync {
    /// Insert or replace an asset (keyed by URL).
    async fn upsert(&self, asset: &CachedAsset) -> Result<()>;

    /// Find an asset by its source URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<CachedAsset>>;

    /// All assets owned by a pinned record.
    async fn find_by_remote_id(&self, remote_id: &RecipeId) -> Result<Vec<CachedAsset>>;

    /// Delete all assets owned by a pinned record; returns how many went.
    async fn delete_by_remote_id(&self, remote_id: &RecipeId) -> Result<u64>;
}

/// SQLite implementation of [`CachedAssetRepository`]
pub struct SqliteCachedAssetRepository {
    pool: SqlitePool,
}

impl SqliteCachedAssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CachedAssetRow {
    url: String,
    remote_id: String,
    data: Vec<u8>,
    size_bytes: i64,
    cached_at: i64,
}

impl TryFrom<CachedAssetRow> for CachedAsset {
    type Error = CacheError;

    fn try_from(row: CachedAssetRow) -> Result<Self> {
        let cached_at = DateTime::from_timestamp_millis(row.cached_at).ok_or_else(|| {
            CacheError::InvalidRecord(format!("Out-of-range cached_at: {}", row.cached_at))
        })?;

        Ok(CachedAsset {
            url: row.url,
            remote_id: RecipeId::new(row.remote_id),
            data: row.data,
            size_bytes: row.size_bytes,
            cached_at,
        })
    }
}

#[async_trait]
impl CachedAssetRepository for SqliteCachedAssetRepository {
    async fn upsert(&self, asset: &CachedAsset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cached_assets (url, remote_id, data, size_bytes, cached_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                remote_id = excluded.remote_id,
                data = excluded.data,
                size_bytes = excluded.size_bytes,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(&asset.url)
        .bind(asset.remote_id.as_str())
        .bind(&asset.data)
        .bind(asset.size_bytes)
        .bind(asset.cached_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<CachedAsset>> {
        let row = sqlx::query_as::<_, CachedAssetRow>("SELECT * FROM cached_assets WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CachedAsset::try_from).transpose()
    }

    async fn find_by_remote_id(&self, remote_id: &RecipeId) -> Result<Vec<CachedAsset>> {
        let rows = sqlx::query_as::<_, CachedAssetRow>(
            "SELECT * FROM cached_assets WHERE remote_id = ? ORDER BY cached_at ASC",
        )
        .bind(remote_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CachedAsset::try_from).collect()
    }

    async fn delete_by_remote_id(&self, remote_id: &RecipeId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_assets WHERE remote_id = ?")
            .bind(remote_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
