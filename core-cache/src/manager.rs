//! # Cache Manager
//!
//! The orchestrating public surface of the offline cache. All writes to the
//! cache tables flow through this type, including the reconciliation
//! engine's, so quota accounting and the remote-id uniqueness rule have a
//! single enforcement point.
//!
//! ## Concurrency
//!
//! Operations on the same remote id serialize through a per-record advisory
//! lock; operations on different records proceed concurrently. Quota-charged
//! writes additionally serialize through a manager-wide admission gate, so a
//! usage check and the row write it admits are one atomic step even across
//! different records. The locks are advisory only, the database remains the
//! source of truth.

use crate::error::{CacheError, Result};
use crate::models::{CachedAsset, PinnedRecord, SyncStatus};
use crate::quota::{CacheUsage, QuotaConfig, QuotaManager};
use crate::repositories::{
    CachedAssetRepository, MetadataRepository, PinnedRecordRepository, SqliteCachedAssetRepository,
    SqliteMetadataRepository, SqlitePinnedRecordRepository, SqliteSyncQueueRepository,
    SyncQueueRepository,
};
use bridge_traits::assets::AssetFetcher;
use bridge_traits::remote::{RecipeId, RemoteRecipe};
use bridge_traits::time::Clock;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Flat per-asset storage charge, applied when a record carries an image URL.
///
/// The image is fetched after the record row commits, so its true size is not
/// known at admission time; the quota check uses this estimate instead and
/// keeps admission deterministic.
pub const ASSET_BYTES_ESTIMATE: i64 = 100 * 1024;

/// Public API of the offline cache.
pub struct CacheManager {
    pinned: Arc<dyn PinnedRecordRepository>,
    assets: Arc<dyn CachedAssetRepository>,
    queue: Arc<dyn SyncQueueRepository>,
    metadata: Arc<dyn MetadataRepository>,
    quota: QuotaManager,
    asset_fetcher: Arc<dyn AssetFetcher>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    // Advisory per-remote-id locks; entries are pruned once the record is
    // gone and no task still holds a clone.
    record_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    // Serializes a quota check with the row write it admits, so concurrent
    // pins of different records cannot both pass the same headroom.
    admission_gate: Mutex<()>,
}

impl CacheManager {
    /// Create a manager over an initialized pool (see [`db::create_pool`]).
    pub fn new(
        pool: SqlitePool,
        quota_config: QuotaConfig,
        asset_fetcher: Arc<dyn AssetFetcher>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        let pinned: Arc<dyn PinnedRecordRepository> =
            Arc::new(SqlitePinnedRecordRepository::new(pool.clone()));
        Self {
            pinned: Arc::clone(&pinned),
            assets: Arc::new(SqliteCachedAssetRepository::new(pool.clone())),
            queue: Arc::new(SqliteSyncQueueRepository::new(pool.clone())),
            metadata: Arc::new(SqliteMetadataRepository::new(pool)),
            quota: QuotaManager::new(quota_config, pinned),
            asset_fetcher,
            clock,
            event_bus,
            record_locks: Arc::new(Mutex::new(HashMap::new())),
            admission_gate: Mutex::new(()),
        }
    }

    /// The sync queue repository, for the reconciliation engine's pass
    /// bookkeeping.
    pub fn sync_queue(&self) -> Arc<dyn SyncQueueRepository> {
        Arc::clone(&self.queue)
    }

    /// The metadata repository (`last_sync_at` and friends).
    pub fn metadata(&self) -> Arc<dyn MetadataRepository> {
        Arc::clone(&self.metadata)
    }

    // ========================================================================
    // Pin lifecycle
    // ========================================================================

    /// Pin a remote recipe for offline use.
    ///
    /// The quota check runs before anything is written; a pin that would
    /// breach a ceiling fails with [`CacheError::QuotaExceeded`] and never
    /// evicts on its own. Pinning a remote id that is already active
    /// refreshes the stored content in place, preserving the pin identity and
    /// its access bookkeeping.
    ///
    /// Image caching is best-effort: a failed fetch leaves `has_asset =
    /// false`, emits [`CacheEvent::AssetCacheFailed`], and the pin still
    /// succeeds.
    pub async fn pin(&self, remote: &RemoteRecipe) -> Result<PinnedRecord> {
        let lock = self.record_lock(&remote.id).await;
        let _guard = lock.lock().await;

        let storage_bytes = estimate_storage_bytes(remote)?;
        let existing = self.pinned.find_by_remote_id(&remote.id).await?;

        let admission = self.admission_gate.lock().await;
        let mut record = match existing {
            Some(current) => {
                self.quota
                    .check_replacement(storage_bytes, current.storage_bytes)
                    .await?;
                let image_url_changed = current.image_url != remote.image_url;
                // A stale snapshot must not roll the version back.
                let version = remote.version().max(current.sync_version);
                let updated = current.with_remote_content(remote, version, storage_bytes);
                self.pinned.update(&updated).await?;
                if image_url_changed {
                    self.assets.delete_by_remote_id(&remote.id).await?;
                    self.pinned.set_has_asset(&remote.id, false).await?;
                }
                debug!(remote_id = %remote.id, "Re-pin refreshed content in place");
                PinnedRecord {
                    has_asset: updated.has_asset && !image_url_changed,
                    ..updated
                }
            }
            None => {
                self.quota.check_admission(storage_bytes).await?;
                let fresh = PinnedRecord::from_remote(remote, self.clock.now(), storage_bytes);
                self.pinned.insert(&fresh).await?;
                fresh
            }
        };
        drop(admission);

        if let Some(url) = remote.image_url.clone() {
            if !record.has_asset {
                match self.cache_asset(&remote.id, &url).await {
                    Ok(()) => record.has_asset = true,
                    Err(e) => {
                        warn!(remote_id = %remote.id, url = %url, error = %e, "Image caching failed; pin kept without asset");
                        self.event_bus
                            .emit(CoreEvent::Cache(CacheEvent::AssetCacheFailed {
                                remote_id: remote.id.to_string(),
                                url,
                                message: e.to_string(),
                            }))
                            .ok();
                    }
                }
            }
        }

        info!(remote_id = %remote.id, storage_bytes, "Pinned recipe");
        self.event_bus
            .emit(CoreEvent::Cache(CacheEvent::Pinned {
                remote_id: remote.id.to_string(),
                storage_bytes,
            }))
            .ok();

        Ok(record)
    }

    /// Remove a pin together with its cached assets and queue entries.
    ///
    /// Idempotent: unpinning an absent record returns `Ok(false)`.
    pub async fn unpin(&self, remote_id: &RecipeId) -> Result<bool> {
        let deleted = {
            let lock = self.record_lock(remote_id).await;
            let _guard = lock.lock().await;
            self.pinned.delete_with_assets(remote_id).await?
        };
        self.prune_record_lock(remote_id).await;
        if deleted {
            info!(remote_id = %remote_id, "Unpinned recipe");
            self.event_bus
                .emit(CoreEvent::Cache(CacheEvent::Unpinned {
                    remote_id: remote_id.to_string(),
                }))
                .ok();
        }
        Ok(deleted)
    }

    /// Whether a remote id is currently pinned.
    pub async fn is_pinned(&self, remote_id: &RecipeId) -> Result<bool> {
        self.pinned.exists(remote_id).await
    }

    /// All pinned records, most recently accessed first. Recomputed from the
    /// store on every call.
    pub async fn list_pinned(&self) -> Result<Vec<PinnedRecord>> {
        self.pinned.find_all().await
    }

    /// Record an access: advance `last_accessed_at`, increment
    /// `access_count`, and return the updated record.
    pub async fn touch(&self, remote_id: &RecipeId) -> Result<PinnedRecord> {
        self.pinned
            .record_access(remote_id, self.clock.now())
            .await?
            .ok_or_else(|| CacheError::NotFound {
                remote_id: remote_id.to_string(),
            })
    }

    /// Current cache occupancy.
    pub async fn usage(&self) -> Result<CacheUsage> {
        self.quota.compute_usage().await
    }

    /// Evict records until at least `target_free_bytes` are reclaimed or the
    /// cache is empty, least-used-then-oldest first. Returns how many records
    /// were removed.
    pub async fn evict(&self, target_free_bytes: i64) -> Result<u64> {
        let candidates = self.quota.select_eviction_candidates(target_free_bytes).await?;

        let mut removed: u64 = 0;
        for candidate in candidates {
            let deleted = {
                let lock = self.record_lock(&candidate.remote_id).await;
                let _guard = lock.lock().await;
                // The record may have gone away since selection.
                self.pinned.delete_with_assets(&candidate.remote_id).await?
            };
            self.prune_record_lock(&candidate.remote_id).await;

            if deleted {
                removed += 1;
                info!(
                    remote_id = %candidate.remote_id,
                    freed_bytes = candidate.storage_bytes,
                    "Evicted recipe to free storage"
                );
                self.event_bus
                    .emit(CoreEvent::Cache(CacheEvent::Evicted {
                        remote_id: candidate.remote_id.to_string(),
                        freed_bytes: candidate.storage_bytes,
                    }))
                    .ok();
            }
        }

        Ok(removed)
    }

    // ========================================================================
    // Reconciliation write path
    // ========================================================================

    /// Replace a pin's content with a newer remote record, preserving pin
    /// metadata and stamping the given version. Sync status resets to
    /// `Synced` and `storage_bytes` is recomputed.
    pub async fn apply_remote_update(
        &self,
        remote_id: &RecipeId,
        remote: &RemoteRecipe,
        new_version: i64,
    ) -> Result<PinnedRecord> {
        let lock = self.record_lock(remote_id).await;
        let _guard = lock.lock().await;

        let current = self
            .pinned
            .find_by_remote_id(remote_id)
            .await?
            .ok_or_else(|| CacheError::NotFound {
                remote_id: remote_id.to_string(),
            })?;

        let storage_bytes = estimate_storage_bytes(remote)?;
        let image_url_changed = current.image_url != remote.image_url;
        let mut updated = current.with_remote_content(remote, new_version, storage_bytes);
        self.pinned.update(&updated).await?;

        if image_url_changed {
            self.assets.delete_by_remote_id(remote_id).await?;
            self.pinned.set_has_asset(remote_id, false).await?;
            updated.has_asset = false;
            if let Some(url) = remote.image_url.clone() {
                match self.cache_asset(remote_id, &url).await {
                    Ok(()) => updated.has_asset = true,
                    Err(e) => {
                        warn!(remote_id = %remote_id, url = %url, error = %e, "Image refresh failed; record kept without asset");
                        self.event_bus
                            .emit(CoreEvent::Cache(CacheEvent::AssetCacheFailed {
                                remote_id: remote_id.to_string(),
                                url,
                                message: e.to_string(),
                            }))
                            .ok();
                    }
                }
            }
        }

        debug!(remote_id = %remote_id, new_version, "Applied remote update");
        Ok(updated)
    }

    /// Set a pin's sync status and last failure reason. Returns false when
    /// the record is not pinned.
    pub async fn mark_sync_status(
        &self,
        remote_id: &RecipeId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        self.pinned.set_sync_status(remote_id, status, error).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn record_lock(&self, remote_id: &RecipeId) -> Arc<Mutex<()>> {
        let mut locks = self.record_locks.lock().await;
        Arc::clone(
            locks
                .entry(remote_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop a record's lock entry once no task holds a clone. Called after a
    /// record is removed so the map does not accumulate every id ever seen.
    async fn prune_record_lock(&self, remote_id: &RecipeId) {
        let mut locks = self.record_locks.lock().await;
        if let Some(entry) = locks.get(remote_id.as_str()) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(remote_id.as_str());
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn record_lock_entries(&self) -> usize {
        self.record_locks.lock().await.len()
    }

    /// Fetch and store the primary image, then flip `has_asset`.
    async fn cache_asset(&self, remote_id: &RecipeId, url: &str) -> Result<()> {
        let data = self
            .asset_fetcher
            .fetch(url)
            .await
            .map_err(|e| CacheError::AssetCache {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let asset = CachedAsset {
            url: url.to_string(),
            remote_id: remote_id.clone(),
            size_bytes: data.len() as i64,
            data: data.to_vec(),
            cached_at: self.clock.now(),
        };
        self.assets.upsert(&asset).await?;
        self.pinned.set_has_asset(remote_id, true).await?;
        Ok(())
    }
}

/// Storage charge for a record: its serialized JSON size, plus the flat
/// asset estimate when it carries an image URL.
pub fn estimate_storage_bytes(remote: &RemoteRecipe) -> Result<i64> {
    let serialized = serde_json::to_vec(remote)
        .map_err(|e| CacheError::InvalidRecord(format!("Unserializable record: {e}")))?;
    let mut bytes = serialized.len() as i64;
    if remote.image_url.is_some() {
        bytes += ASSET_BYTES_ESTIMATE;
    }
    Ok(bytes)
}

/// Convenience constructor for tests: in-memory pool plus the given doubles.
#[cfg(test)]
pub(crate) async fn test_manager(
    quota_config: QuotaConfig,
    asset_fetcher: Arc<dyn AssetFetcher>,
    clock: Arc<dyn Clock>,
) -> CacheManager {
    let pool = crate::db::create_test_pool().await.unwrap();
    CacheManager::new(pool, quota_config, asset_fetcher, clock, EventBus::default())
}
