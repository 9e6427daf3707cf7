//! # Event Bus System
//!
//! Provides an event-driven architecture for the offline cache core using
//! `tokio::sync::broadcast`. The cache manager and the reconciliation engine
//! publish typed events; the (out-of-scope) UI layer subscribes deliberately
//! instead of relying on an implicit global broadcast.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, CacheEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Cache(CacheEvent::Pinned {
//!         remote_id: "r-123".to_string(),
//!         storage_bytes: 2048,
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! The bus uses `tokio::sync::broadcast`, which yields two receiver errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal;
//!   it can keep receiving new events.
//! - **`RecvError::Closed`**: all senders were dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Cache mutation events
    Cache(CacheEvent),
    /// Reconciliation events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the cache manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A recipe was pinned for offline use.
    Pinned {
        /// The remote record id.
        remote_id: String,
        /// Bytes the pin accounts for against the quota.
        storage_bytes: i64,
    },
    /// A pinned recipe was removed.
    Unpinned {
        /// The remote record id.
        remote_id: String,
    },
    /// A pinned recipe was evicted to free storage.
    Evicted {
        /// The remote record id.
        remote_id: String,
        /// Bytes freed by the eviction.
        freed_bytes: i64,
    },
    /// Image caching failed for a pin that otherwise succeeded.
    AssetCacheFailed {
        /// The remote record id.
        remote_id: String,
        /// The asset URL that could not be cached.
        url: String,
        /// Why the fetch failed.
        message: String,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Pinned { .. } => "Recipe pinned for offline use",
            CacheEvent::Unpinned { .. } => "Recipe unpinned",
            CacheEvent::Evicted { .. } => "Recipe evicted",
            CacheEvent::AssetCacheFailed { .. } => "Image caching failed",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A reconciliation pass started.
    Started {
        /// Number of pinned records the pass will visit.
        records: u64,
    },
    /// The pass was skipped because the device is offline.
    Skipped,
    /// A pinned record was updated in place from the remote store.
    RecordUpdated {
        /// The remote record id.
        remote_id: String,
        /// The new sync version after the update.
        version: i64,
    },
    /// The remote counterpart of a pinned record could not be found.
    RecordConflicted {
        /// The remote record id.
        remote_id: String,
    },
    /// A remote fetch failed; the record stays usable offline.
    RecordFailed {
        /// The remote record id.
        remote_id: String,
        /// The last failure reason, for display.
        message: String,
    },
    /// A reconciliation pass finished.
    Completed {
        updated: u64,
        conflicted: u64,
        errored: u64,
        unchanged: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Reconciliation started",
            SyncEvent::Skipped => "Reconciliation skipped while offline",
            SyncEvent::RecordUpdated { .. } => "Pinned recipe updated",
            SyncEvent::RecordConflicted { .. } => "Pinned recipe conflicted",
            SyncEvent::RecordFailed { .. } => "Pinned recipe failed to sync",
            SyncEvent::Completed { .. } => "Reconciliation completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are none. Callers that treat delivery as best-effort should
    /// `.ok()` the result.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
