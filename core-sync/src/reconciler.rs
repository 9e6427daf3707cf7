//! # Reconciler
//!
//! Drives the per-record sync state machine over all pinned records. See the
//! crate docs for the pass-level contract; this module is the implementation.

use crate::error::Result;
use crate::summary::SyncSummary;
use bridge_traits::network::NetworkMonitor;
use bridge_traits::notify::NotificationSink;
use bridge_traits::remote::RemoteRecipeStore;
use bridge_traits::time::Clock;
use core_cache::{CacheError, CacheManager, PinnedRecord, QueueOperation, SyncStatus};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default ceiling for a single remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Tunables for a reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Per-record remote fetch timeout; an elapsed timeout is an `Error`
    /// outcome for that record, not a pass failure.
    pub fetch_timeout: Duration,
    /// Whether to deliver a notification when a pass updated anything.
    pub notify_on_update: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            notify_on_update: true,
        }
    }
}

/// The reconciliation engine.
///
/// Reads through the [`RemoteRecipeStore`] bridge and writes exclusively
/// through the [`CacheManager`] reconciliation path, so the cache's quota and
/// uniqueness rules keep a single enforcement point.
pub struct Reconciler {
    cache: Arc<CacheManager>,
    remote: Arc<dyn RemoteRecipeStore>,
    network: Option<Arc<dyn NetworkMonitor>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    config: ReconcilerConfig,
}

/// Outcome of a single record's reconciliation step.
enum RecordOutcome {
    Unchanged,
    Updated { version: i64 },
    Conflicted,
    Errored { message: String },
    /// The record disappeared mid-pass (concurrent unpin).
    Gone,
}

impl Reconciler {
    pub fn new(
        cache: Arc<CacheManager>,
        remote: Arc<dyn RemoteRecipeStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            cache,
            remote,
            network: None,
            notifier: None,
            clock,
            event_bus,
            config,
        }
    }

    /// Attach a connectivity signal. Without one the reconciler assumes the
    /// device is online.
    pub fn with_network_monitor(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Attach a notification sink for post-pass summaries.
    pub fn with_notification_sink(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run a full reconciliation pass.
    pub async fn reconcile(&self) -> Result<SyncSummary> {
        self.reconcile_with_token(CancellationToken::new()).await
    }

    /// Run a full reconciliation pass under a cancellation token.
    ///
    /// Cancellation is checked between records; per-record effects already
    /// committed stay committed, and the queue journal is left in place so a
    /// later pass resumes past the finished records.
    pub async fn reconcile_with_token(&self, token: CancellationToken) -> Result<SyncSummary> {
        if let Some(network) = &self.network {
            if !network.is_connected().await {
                info!("Device offline; reconciliation skipped");
                self.event_bus.emit(CoreEvent::Sync(SyncEvent::Skipped)).ok();
                return Ok(SyncSummary::skipped());
            }
        }

        let records = self.cache.list_pinned().await?;
        let queue = self.cache.sync_queue();
        let completed = queue.completed_remote_ids().await?;

        info!(records = records.len(), "Reconciliation pass started");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                records: records.len() as u64,
            }))
            .ok();

        let mut summary = SyncSummary::default();

        for record in records {
            if token.is_cancelled() {
                warn!("Reconciliation cancelled mid-pass");
                summary.cancelled = true;
                break;
            }

            // Journaled as done by an interrupted pass; don't redo the fetch.
            if completed.contains(record.remote_id.as_str()) {
                debug!(remote_id = %record.remote_id, "Skipping record completed by a previous pass");
                summary.unchanged += 1;
                continue;
            }

            let entry = queue
                .ensure_pending(&record.remote_id, QueueOperation::Download, self.clock.now())
                .await?;

            let outcome = self.reconcile_record(&record).await?;
            match &outcome {
                RecordOutcome::Unchanged => {
                    summary.unchanged += 1;
                    queue.mark_completed(&entry.id, self.clock.now()).await?;
                }
                RecordOutcome::Updated { version } => {
                    summary.updated += 1;
                    self.event_bus
                        .emit(CoreEvent::Sync(SyncEvent::RecordUpdated {
                            remote_id: record.remote_id.to_string(),
                            version: *version,
                        }))
                        .ok();
                    queue.mark_completed(&entry.id, self.clock.now()).await?;
                }
                RecordOutcome::Conflicted => {
                    summary.conflicted += 1;
                    self.event_bus
                        .emit(CoreEvent::Sync(SyncEvent::RecordConflicted {
                            remote_id: record.remote_id.to_string(),
                        }))
                        .ok();
                    queue.mark_completed(&entry.id, self.clock.now()).await?;
                }
                RecordOutcome::Errored { message } => {
                    summary.errored += 1;
                    self.event_bus
                        .emit(CoreEvent::Sync(SyncEvent::RecordFailed {
                            remote_id: record.remote_id.to_string(),
                            message: message.clone(),
                        }))
                        .ok();
                    // Failed, not completed: a resumed pass retries it.
                    queue.mark_failed(&entry.id, message, self.clock.now()).await?;
                }
                RecordOutcome::Gone => {
                    queue.mark_completed(&entry.id, self.clock.now()).await?;
                }
            }
        }

        if !summary.cancelled {
            // Stamped even when every record errored: the pass itself ran.
            self.cache.metadata().set_last_sync_at(self.clock.now()).await?;
            queue.clear_completed().await?;

            info!(%summary, "Reconciliation pass completed");
            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::Completed {
                    updated: summary.updated,
                    conflicted: summary.conflicted,
                    errored: summary.errored,
                    unchanged: summary.unchanged,
                }))
                .ok();

            if self.config.notify_on_update && summary.updated > 0 {
                self.deliver_notification(summary.updated).await;
            }
        }

        Ok(summary)
    }

    /// One record's step: bounded fetch, version compare, transition.
    async fn reconcile_record(&self, record: &PinnedRecord) -> Result<RecordOutcome> {
        let fetched =
            tokio::time::timeout(self.config.fetch_timeout, self.remote.get_by_id(&record.remote_id))
                .await;

        let remote = match fetched {
            Err(_) => {
                let message = format!(
                    "Remote fetch timed out after {}s",
                    self.config.fetch_timeout.as_secs()
                );
                warn!(remote_id = %record.remote_id, "{message}");
                self.cache
                    .mark_sync_status(&record.remote_id, SyncStatus::Error, Some(&message))
                    .await?;
                return Ok(RecordOutcome::Errored { message });
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                warn!(remote_id = %record.remote_id, error = %message, "Remote fetch failed");
                self.cache
                    .mark_sync_status(&record.remote_id, SyncStatus::Error, Some(&message))
                    .await?;
                return Ok(RecordOutcome::Errored { message });
            }
            Ok(Ok(None)) => {
                // Server-side deletion. The local copy is kept; the user
                // resolves the conflict by unpinning or re-pinning later.
                debug!(remote_id = %record.remote_id, "Remote record gone; marking conflict");
                self.cache
                    .mark_sync_status(&record.remote_id, SyncStatus::Conflict, None)
                    .await?;
                return Ok(RecordOutcome::Conflicted);
            }
            Ok(Ok(Some(remote))) => remote,
        };

        let remote_version = remote.version();
        if remote_version > record.sync_version {
            match self
                .cache
                .apply_remote_update(&record.remote_id, &remote, remote_version)
                .await
            {
                Ok(_) => {
                    debug!(
                        remote_id = %record.remote_id,
                        from = record.sync_version,
                        to = remote_version,
                        "Record updated in place"
                    );
                    Ok(RecordOutcome::Updated {
                        version: remote_version,
                    })
                }
                Err(CacheError::NotFound { .. }) => {
                    debug!(remote_id = %record.remote_id, "Record unpinned mid-pass");
                    Ok(RecordOutcome::Gone)
                }
                Err(e) => Err(e.into()),
            }
        } else {
            // Same (or older) remote version. A record stuck in error or
            // conflict from an earlier pass recovers to synced here.
            if record.sync_status != SyncStatus::Synced {
                self.cache
                    .mark_sync_status(&record.remote_id, SyncStatus::Synced, None)
                    .await?;
            }
            Ok(RecordOutcome::Unchanged)
        }
    }

    async fn deliver_notification(&self, updated: u64) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let message = if updated == 1 {
            "1 saved recipe was updated".to_string()
        } else {
            format!("{updated} saved recipes were updated")
        };
        if let Err(e) = notifier.notify(&message).await {
            warn!(error = %e, "Notification delivery failed");
        }
    }
}
