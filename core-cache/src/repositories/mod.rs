//! Repository traits and SQLite implementations for the four cache tables.

mod asset;
mod metadata;
mod pinned;
mod queue;

pub use asset::{CachedAssetRepository, SqliteCachedAssetRepository};
pub use metadata::{MetadataRepository, SqliteMetadataRepository, LAST_SYNC_AT_KEY};
pub use pinned::{PinnedRecordRepository, SqlitePinnedRecordRepository};
pub use queue::{SqliteSyncQueueRepository, SyncQueueRepository};
