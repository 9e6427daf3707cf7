//! # Core Configuration Module
//!
//! Provides configuration management for the offline recipe cache core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`CoreConfig`] holding the host bridges and settings the core needs. It
//! enforces fail-fast validation so a missing bridge surfaces as one
//! actionable error at startup instead of a latent panic later.
//!
//! ## Required Dependencies
//!
//! - `RemoteRecipeStore` - the remote record source reconciliation runs
//!   against
//! - `AssetFetcher` - image-blob retrieval for best-effort asset caching
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - connectivity signal; without one, reconciliation
//!   assumes the device is online
//! - `NotificationSink` - summary delivery after reconciliation
//! - `Clock` - time source (defaults to `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/offline.db")
//!     .max_storage_bytes(50 * 1024 * 1024)
//!     .max_pinned_records(100)
//!     .remote_store(Arc::new(MyRemoteStore))
//!     .asset_fetcher(Arc::new(MyAssetFetcher))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AssetFetcher, Clock, NetworkMonitor, NotificationSink, RemoteRecipeStore, SystemClock,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default per-record remote fetch timeout during reconciliation.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Core configuration for the offline recipe cache.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file; `None` means in-memory (tests)
    pub database_path: Option<PathBuf>,

    /// Byte ceiling for all pinned records together
    pub max_storage_bytes: i64,

    /// Count ceiling for pinned records
    pub max_pinned_records: u32,

    /// Timeout for each remote fetch during reconciliation
    pub fetch_timeout: Duration,

    /// Remote recipe store (required)
    pub remote_store: Arc<dyn RemoteRecipeStore>,

    /// Asset fetcher for recipe images (required)
    pub asset_fetcher: Arc<dyn AssetFetcher>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// User notification sink (optional)
    pub notification_sink: Option<Arc<dyn NotificationSink>>,

    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl CoreConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    max_storage_bytes: Option<i64>,
    max_pinned_records: Option<u32>,
    fetch_timeout: Option<Duration>,
    remote_store: Option<Arc<dyn RemoteRecipeStore>>,
    asset_fetcher: Option<Arc<dyn AssetFetcher>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQLite database file path. Omit for an in-memory database.
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the byte ceiling for pinned storage.
    pub fn max_storage_bytes(mut self, bytes: i64) -> Self {
        self.max_storage_bytes = Some(bytes);
        self
    }

    /// Set the pinned record count ceiling.
    pub fn max_pinned_records(mut self, count: u32) -> Self {
        self.max_pinned_records = Some(count);
        self
    }

    /// Set the per-record remote fetch timeout for reconciliation.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn remote_store(mut self, store: Arc<dyn RemoteRecipeStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    pub fn asset_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.asset_fetcher = Some(fetcher);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when a required bridge was not
    /// provided, and [`Error::InvalidConfig`] for nonsensical quota ceilings.
    pub fn build(self) -> Result<CoreConfig> {
        let remote_store = self
            .remote_store
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "RemoteRecipeStore".to_string(),
                message: "Provide the remote store implementation the cache reconciles against."
                    .to_string(),
            })?;

        let asset_fetcher = self
            .asset_fetcher
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "AssetFetcher".to_string(),
                message: "Provide an asset fetcher so recipe images can be cached offline."
                    .to_string(),
            })?;

        let max_storage_bytes = self
            .max_storage_bytes
            .ok_or_else(|| Error::InvalidConfig("max_storage_bytes is required".to_string()))?;
        if max_storage_bytes <= 0 {
            return Err(Error::InvalidConfig(format!(
                "max_storage_bytes must be positive, got {}",
                max_storage_bytes
            )));
        }

        let max_pinned_records = self
            .max_pinned_records
            .ok_or_else(|| Error::InvalidConfig("max_pinned_records is required".to_string()))?;
        if max_pinned_records == 0 {
            return Err(Error::InvalidConfig(
                "max_pinned_records must be at least 1".to_string(),
            ));
        }

        Ok(CoreConfig {
            database_path: self.database_path,
            max_storage_bytes,
            max_pinned_records,
            fetch_timeout: self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
            remote_store,
            asset_fetcher,
            network_monitor: self.network_monitor,
            notification_sink: self.notification_sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::remote::{RecipeId, RecipePage, RemoteRecipe};
    use bytes::Bytes;

    struct NullRemote;

    #[async_trait]
    impl RemoteRecipeStore for NullRemote {
        async fn get_by_id(&self, _id: &RecipeId) -> BridgeResult<Option<RemoteRecipe>> {
            Ok(None)
        }

        async fn list(&self, _page_token: Option<String>) -> BridgeResult<RecipePage> {
            Ok(RecipePage {
                records: vec![],
                next_page_token: None,
            })
        }
    }

    struct NullFetcher;

    #[async_trait]
    impl AssetFetcher for NullFetcher {
        async fn fetch(&self, _url: &str) -> BridgeResult<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[test]
    fn test_build_requires_remote_store() {
        let result = CoreConfig::builder()
            .max_storage_bytes(1024)
            .max_pinned_records(10)
            .asset_fetcher(Arc::new(NullFetcher))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { capability, .. }) if capability == "RemoteRecipeStore"
        ));
    }

    #[test]
    fn test_build_rejects_zero_count_ceiling() {
        let result = CoreConfig::builder()
            .max_storage_bytes(1024)
            .max_pinned_records(0)
            .remote_store(Arc::new(NullRemote))
            .asset_fetcher(Arc::new(NullFetcher))
            .build();

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_build_with_defaults() {
        let config = CoreConfig::builder()
            .max_storage_bytes(50 * 1024 * 1024)
            .max_pinned_records(100)
            .remote_store(Arc::new(NullRemote))
            .asset_fetcher(Arc::new(NullFetcher))
            .build()
            .unwrap();

        assert!(config.database_path.is_none());
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
        assert!(config.network_monitor.is_none());
    }
}
