//! # Reconciliation Engine
//!
//! Keeps pinned offline recipes consistent with the remote store. A
//! reconciliation pass sweeps every pinned record, compares version stamps,
//! and applies one of four per-record outcomes: unchanged, updated in place,
//! conflicted (remote deletion), or errored (fetch failure, record stays
//! usable offline).
//!
//! ## Design
//!
//! - **Offline is a no-op**: when the network monitor reports anything but
//!   connected, the pass returns a trivial summary without touching the
//!   store.
//! - **Failure isolation**: one record's fetch failure never aborts the
//!   sweep; it is recorded on that record and the pass moves on.
//! - **Resumability**: per-record progress is journaled in the sync queue, so
//!   an interrupted pass skips already-completed records when retried.
//! - **Single writer**: all row mutations go through the cache manager's
//!   reconciliation write path; this crate never touches SQL directly.

pub mod engine;
pub mod error;
pub mod reconciler;
pub mod summary;

pub use engine::OfflineCore;
pub use error::{Result, SyncError};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use summary::SyncSummary;
