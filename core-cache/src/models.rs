//! Data model for the offline cache tables.
//!
//! `PinnedRecord` is a fixed, fully-typed structure: the remote recipe's
//! content fields plus explicit offline metadata. There is deliberately no
//! open-ended property bag, so the quota and sync invariants stay checkable.

use crate::error::CacheError;
use bridge_traits::remote::{RecipeId, RemoteRecipe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Process-unique identifier of a pin instance.
///
/// Stable for the lifetime of the pin and distinct from the remote record's
/// own id: the pin identity survives content refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalKey(String);

impl LocalKey {
    /// Generate a fresh key.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a key from its string form.
    pub fn from_string(s: &str) -> Result<Self, CacheError> {
        Uuid::parse_str(s)
            .map_err(|e| CacheError::InvalidRecord(format!("Invalid local key {s:?}: {e}")))?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LocalKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a sync queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueEntryId(String);

impl QueueEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Result<Self, CacheError> {
        Uuid::parse_str(s)
            .map_err(|e| CacheError::InvalidRecord(format!("Invalid queue entry id {s:?}: {e}")))?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Sync status
// ============================================================================

/// Per-record synchronization state against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local copy agrees with the remote store as of the last pass
    Synced,
    /// A local change or refresh is waiting to be confirmed
    Pending,
    /// The remote counterpart could not be found (server-side deletion);
    /// the local copy is kept until the user acknowledges
    Conflict,
    /// The last remote fetch failed; the record remains usable offline
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(SyncStatus::Synced),
            "pending" => Ok(SyncStatus::Pending),
            "conflict" => Ok(SyncStatus::Conflict),
            "error" => Ok(SyncStatus::Error),
            other => Err(CacheError::InvalidRecord(format!(
                "Invalid sync status: {other}"
            ))),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pinned record
// ============================================================================

/// A full local copy of a remote recipe plus offline metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedRecord {
    /// Pin instance identity (primary key)
    pub local_key: LocalKey,
    /// Source record id; unique among active pins
    pub remote_id: RecipeId,

    // Content fields, mirrored from the remote record
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    // Offline metadata
    /// When the pin was created
    pub pinned_at: DateTime<Utc>,
    /// Advanced on every successful fetch-for-use
    pub last_accessed_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Last failure reason when `sync_status == Error`
    pub sync_error: Option<String>,
    /// Monotonically non-decreasing version stamp for remote comparison
    pub sync_version: i64,
    /// Serialized record size plus the per-asset estimate
    pub storage_bytes: i64,
    /// True once the primary image asset is confirmed cached
    pub has_asset: bool,
    /// Incremented on each access; an eviction signal, never decremented
    pub access_count: i64,
}

impl PinnedRecord {
    /// Build a fresh pin from a remote record.
    pub fn from_remote(remote: &RemoteRecipe, now: DateTime<Utc>, storage_bytes: i64) -> Self {
        Self {
            local_key: LocalKey::new(),
            remote_id: remote.id.clone(),
            title: remote.title.clone(),
            description: remote.description.clone(),
            ingredients: remote.ingredients.clone(),
            instructions: remote.instructions.clone(),
            image_url: remote.image_url.clone(),
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            pinned_at: now,
            last_accessed_at: now,
            sync_status: SyncStatus::Synced,
            sync_error: None,
            sync_version: remote.version(),
            storage_bytes,
            has_asset: false,
            access_count: 0,
        }
    }

    /// Replace content fields from a newer remote record, preserving the pin
    /// metadata (identity, pin time, access bookkeeping, asset ownership).
    pub fn with_remote_content(
        &self,
        remote: &RemoteRecipe,
        sync_version: i64,
        storage_bytes: i64,
    ) -> Self {
        Self {
            local_key: self.local_key.clone(),
            remote_id: self.remote_id.clone(),
            title: remote.title.clone(),
            description: remote.description.clone(),
            ingredients: remote.ingredients.clone(),
            instructions: remote.instructions.clone(),
            image_url: remote.image_url.clone(),
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            pinned_at: self.pinned_at,
            last_accessed_at: self.last_accessed_at,
            sync_status: SyncStatus::Synced,
            sync_error: None,
            sync_version,
            storage_bytes,
            has_asset: self.has_asset,
            access_count: self.access_count,
        }
    }

    /// Reconstruct the remote-record view of this pin's content.
    pub fn to_remote(&self) -> RemoteRecipe {
        RemoteRecipe {
            id: self.remote_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            image_url: self.image_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// Cached asset
// ============================================================================

/// An opaque binary blob keyed by its source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    /// Source URL (primary key)
    pub url: String,
    /// Owning pinned record
    pub remote_id: RecipeId,
    /// The blob itself
    pub data: Vec<u8>,
    pub size_bytes: i64,
    pub cached_at: DateTime<Utc>,
}

// ============================================================================
// Sync queue
// ============================================================================

/// Operation a queue entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    Download,
    Update,
    Delete,
}

impl QueueOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Download => "download",
            QueueOperation::Update => "update",
            QueueOperation::Delete => "delete",
        }
    }
}

impl FromStr for QueueOperation {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(QueueOperation::Download),
            "update" => Ok(QueueOperation::Update),
            "delete" => Ok(QueueOperation::Delete),
            other => Err(CacheError::InvalidRecord(format!(
                "Invalid queue operation: {other}"
            ))),
        }
    }
}

/// Processing state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

impl FromStr for QueueStatus {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(CacheError::InvalidRecord(format!(
                "Invalid queue status: {other}"
            ))),
        }
    }
}

/// A pending reconciliation operation, persisted so an interrupted pass can
/// resume without reprocessing already-completed work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueEntry {
    pub id: QueueEntryId,
    pub remote_id: RecipeId,
    pub operation: QueueOperation,
    pub status: QueueStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_remote() -> RemoteRecipe {
        RemoteRecipe {
            id: RecipeId::new("r1"),
            title: "Sourdough".to_string(),
            description: Some("Slow-fermented loaf".to_string()),
            ingredients: vec!["flour".to_string(), "water".to_string(), "salt".to_string()],
            instructions: vec!["mix".to_string(), "wait".to_string(), "bake".to_string()],
            image_url: Some("https://img.example/r1.jpg".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_sync_status_round_trip() {
        for status in [
            SyncStatus::Synced,
            SyncStatus::Pending,
            SyncStatus::Conflict,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_from_remote_initial_state() {
        let remote = sample_remote();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let pin = PinnedRecord::from_remote(&remote, now, 4096);

        assert_eq!(pin.remote_id, remote.id);
        assert_eq!(pin.sync_status, SyncStatus::Synced);
        assert_eq!(pin.sync_version, remote.version());
        assert_eq!(pin.pinned_at, now);
        assert_eq!(pin.last_accessed_at, now);
        assert_eq!(pin.access_count, 0);
        assert!(!pin.has_asset);
        assert_eq!(pin.to_remote(), remote);
    }

    #[test]
    fn test_with_remote_content_preserves_metadata() {
        let remote = sample_remote();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut pin = PinnedRecord::from_remote(&remote, now, 4096);
        pin.access_count = 7;
        pin.has_asset = true;
        pin.sync_status = SyncStatus::Error;
        pin.sync_error = Some("boom".to_string());

        let mut newer = sample_remote();
        newer.title = "Updated Title".to_string();
        newer.updated_at = Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        let updated = pin.with_remote_content(&newer, newer.version(), 5000);

        assert_eq!(updated.title, "Updated Title");
        assert_eq!(updated.local_key, pin.local_key);
        assert_eq!(updated.pinned_at, pin.pinned_at);
        assert_eq!(updated.access_count, 7);
        assert!(updated.has_asset);
        assert_eq!(updated.sync_status, SyncStatus::Synced);
        assert_eq!(updated.sync_error, None);
        assert_eq!(updated.sync_version, newer.version());
    }

    #[test]
    fn test_local_key_validation() {
        let key = LocalKey::new();
        assert!(LocalKey::from_string(key.as_str()).is_ok());
        assert!(LocalKey::from_string("not-a-uuid").is_err());
    }
}
