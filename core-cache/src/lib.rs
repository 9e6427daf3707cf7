//! # Offline Cache Module
//!
//! Owns the durable offline recipe store and provides the public cache API.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and migrations for the four cache tables (pinned records,
//!   cached assets, sync queue, metadata)
//! - Repository patterns for each table
//! - Quota accounting and eviction candidate selection
//! - The [`CacheManager`](manager::CacheManager) public API: pin, unpin,
//!   touch, list, evict, usage
//!
//! ## Components
//!
//! - **Database** (`db`): connection pooling, WAL mode, embedded migrations
//! - **Models** (`models`): fully-typed pinned record, asset, and queue rows
//! - **Repositories** (`repositories`): trait + SQLite implementation per
//!   table
//! - **Quota Manager** (`quota`): byte/count ceilings and the
//!   least-used-then-oldest eviction policy
//! - **Cache Manager** (`manager`): the orchestrating public surface

pub mod db;
pub mod error;
pub mod manager;
pub mod models;
pub mod quota;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{CacheError, Result};
pub use manager::{CacheManager, ASSET_BYTES_ESTIMATE};
pub use models::{
    CachedAsset, LocalKey, PinnedRecord, QueueEntryId, QueueOperation, QueueStatus, SyncQueueEntry,
    SyncStatus,
};
pub use quota::{CacheUsage, QuotaConfig, QuotaManager};
pub use repositories::{
    CachedAssetRepository, MetadataRepository, PinnedRecordRepository, SqliteCachedAssetRepository,
    SqliteMetadataRepository, SqlitePinnedRecordRepository, SqliteSyncQueueRepository,
    SyncQueueRepository,
};
