use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Persistent storage could not be opened or created. Fatal to the whole
    /// subsystem; surfaced once at initialization.
    #[error("Persistent storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A transactional storage operation failed. Retryable by the caller.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// Admitting the record would push usage over a configured ceiling.
    /// Actionable by the caller via explicit eviction.
    #[error(
        "Quota exceeded: admitting {requested_bytes} bytes would exceed limits \
         (usage {used_bytes}/{max_bytes} bytes, {used_count}/{max_count} records)"
    )]
    QuotaExceeded {
        requested_bytes: i64,
        used_bytes: i64,
        max_bytes: i64,
        used_count: u32,
        max_count: u32,
    },

    #[error("No pinned record for remote id {remote_id}")]
    NotFound { remote_id: String },

    /// Image caching failed. Non-fatal; the pin survives without its asset.
    #[error("Asset caching failed for {url}: {message}")]
    AssetCache { url: String, message: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
