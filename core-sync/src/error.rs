use core_cache::CacheError;
use thiserror::Error;

/// Errors a reconciliation pass can surface to its caller.
///
/// Remote fetch failures are deliberately absent: they become per-record
/// `Error` status and a summary count, never a pass failure. Only local
/// storage trouble aborts a pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
