//! # Engine Assembly
//!
//! Composition root for embedding hosts: turns a validated
//! [`CoreConfig`] into a wired cache manager plus reconciler sharing one
//! event bus and one connection pool.

use crate::error::Result;
use crate::reconciler::{Reconciler, ReconcilerConfig};
use crate::summary::SyncSummary;
use core_cache::{create_pool, CacheManager, DatabaseConfig, QuotaConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled offline recipe core.
///
/// ```ignore
/// let config = CoreConfig::builder()
///     .database_path("offline.db")
///     .max_storage_bytes(50 * 1024 * 1024)
///     .max_pinned_records(100)
///     .remote_store(remote)
///     .asset_fetcher(fetcher)
///     .build()?;
///
/// let core = OfflineCore::init(config).await?;
/// core.cache().pin(&recipe).await?;
/// core.reconcile().await?;
/// ```
pub struct OfflineCore {
    cache: Arc<CacheManager>,
    reconciler: Reconciler,
    event_bus: EventBus,
}

impl OfflineCore {
    /// Open (or create) the store and wire up the engine.
    ///
    /// The single fatal failure mode is the database being unusable; every
    /// later condition is per-operation.
    pub async fn init(config: CoreConfig) -> Result<Self> {
        let db_config = match &config.database_path {
            Some(path) => DatabaseConfig::new(path.clone()),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;

        let event_bus = EventBus::default();
        let cache = Arc::new(CacheManager::new(
            pool,
            QuotaConfig {
                max_bytes: config.max_storage_bytes,
                max_count: config.max_pinned_records,
            },
            Arc::clone(&config.asset_fetcher),
            Arc::clone(&config.clock),
            event_bus.clone(),
        ));

        let mut reconciler = Reconciler::new(
            Arc::clone(&cache),
            Arc::clone(&config.remote_store),
            Arc::clone(&config.clock),
            event_bus.clone(),
            ReconcilerConfig {
                fetch_timeout: config.fetch_timeout,
                notify_on_update: config.notification_sink.is_some(),
            },
        );
        if let Some(network) = &config.network_monitor {
            reconciler = reconciler.with_network_monitor(Arc::clone(network));
        }
        if let Some(sink) = &config.notification_sink {
            reconciler = reconciler.with_notification_sink(Arc::clone(sink));
        }

        info!("Offline recipe core initialized");
        Ok(Self {
            cache,
            reconciler,
            event_bus,
        })
    }

    /// The cache surface: pin, unpin, touch, list, evict, usage.
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Run one reconciliation pass.
    pub async fn reconcile(&self) -> Result<SyncSummary> {
        self.reconciler.reconcile().await
    }

    /// Run one reconciliation pass under a cancellation token.
    pub async fn reconcile_with_token(&self, token: CancellationToken) -> Result<SyncSummary> {
        self.reconciler.reconcile_with_token(token).await
    }

    /// Subscribe to cache and sync events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }
}
