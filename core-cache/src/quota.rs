//! # Quota Manager
//!
//! Enforces the storage ceilings configured for the offline cache: a byte
//! budget and a pinned-record count budget. Admission is strict (a pin that
//! would exceed either limit is rejected, never silently evicted for) while
//! reclamation picks victims by access count with last-access recency as the
//! tiebreak.

use crate::error::{CacheError, Result};
use crate::models::PinnedRecord;
use crate::repositories::PinnedRecordRepository;
use std::sync::Arc;

/// Storage ceilings the cache must stay within
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Maximum total bytes of pinned content plus cached assets.
    pub max_bytes: i64,
    /// Maximum number of pinned records.
    pub max_count: u32,
}

/// Snapshot of current cache occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUsage {
    pub count: u32,
    pub total_bytes: i64,
}

/// Quota admission and eviction-candidate selection over the pinned-record
/// table.
pub struct QuotaManager {
    config: QuotaConfig,
    pinned: Arc<dyn PinnedRecordRepository>,
}

impl QuotaManager {
    pub fn new(config: QuotaConfig, pinned: Arc<dyn PinnedRecordRepository>) -> Self {
        Self { config, pinned }
    }

    pub fn config(&self) -> QuotaConfig {
        self.config
    }

    /// Current occupancy, straight from the table.
    pub async fn compute_usage(&self) -> Result<CacheUsage> {
        let (count, total_bytes) = self.pinned.usage().await?;
        Ok(CacheUsage { count, total_bytes })
    }

    /// Check whether admitting a new record of `candidate_bytes` would breach
    /// either ceiling. Returns the usage snapshot on success so the caller
    /// does not re-query.
    pub async fn check_admission(&self, candidate_bytes: i64) -> Result<CacheUsage> {
        let usage = self.compute_usage().await?;
        self.check_against(usage, candidate_bytes, None)?;
        Ok(usage)
    }

    /// Check whether replacing an existing record of `old_bytes` with new
    /// content of `candidate_bytes` would breach the byte ceiling. The count
    /// ceiling is unaffected by an in-place refresh.
    pub async fn check_replacement(&self, candidate_bytes: i64, old_bytes: i64) -> Result<CacheUsage> {
        let usage = self.compute_usage().await?;
        self.check_against(usage, candidate_bytes, Some(old_bytes))?;
        Ok(usage)
    }

    fn check_against(
        &self,
        usage: CacheUsage,
        candidate_bytes: i64,
        reclaimed_bytes: Option<i64>,
    ) -> Result<()> {
        // A replacement reclaims the old row's bytes and keeps the count flat.
        let projected_bytes = usage.total_bytes - reclaimed_bytes.unwrap_or(0) + candidate_bytes;
        let projected_count = if reclaimed_bytes.is_some() {
            usage.count
        } else {
            usage.count + 1
        };

        if projected_bytes > self.config.max_bytes || projected_count > self.config.max_count {
            return Err(CacheError::QuotaExceeded {
                requested_bytes: candidate_bytes,
                used_bytes: usage.total_bytes,
                max_bytes: self.config.max_bytes,
                used_count: usage.count,
                max_count: self.config.max_count,
            });
        }

        Ok(())
    }

    /// Pick the records to evict, cheapest-to-lose first, until at least
    /// `needed_bytes` would be reclaimed. Victims are ordered by access count
    /// ascending, then by last access ascending, so rarely-touched and stale
    /// records go before actively-read ones.
    ///
    /// Returns fewer candidates (possibly all of them) when the whole cache
    /// is smaller than the request.
    pub async fn select_eviction_candidates(&self, needed_bytes: i64) -> Result<Vec<PinnedRecord>> {
        let ordered = self.pinned.eviction_order().await?;

        let mut selected = Vec::new();
        let mut reclaimed: i64 = 0;
        for record in ordered {
            if reclaimed >= needed_bytes {
                break;
            }
            reclaimed += record.storage_bytes;
            selected.push(record);
        }

        Ok(selected)
    }
}
