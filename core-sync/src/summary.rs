//! Outcome of a reconciliation pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-pass outcome counts, one increment per pinned record visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Records refreshed in place from a newer remote version
    pub updated: u64,
    /// Records whose remote counterpart no longer exists
    pub conflicted: u64,
    /// Records whose remote fetch failed or timed out
    pub errored: u64,
    /// Records already at the current remote version
    pub unchanged: u64,
    /// True when the pass was skipped because the device is offline;
    /// all counts are zero in that case
    pub skipped_offline: bool,
    /// True when the pass was cancelled mid-sweep; counts cover the records
    /// processed before the cancellation, and their effects are committed
    pub cancelled: bool,
}

impl SyncSummary {
    pub fn skipped() -> Self {
        Self {
            skipped_offline: true,
            ..Self::default()
        }
    }

    /// Records visited with a definitive outcome.
    pub fn total_processed(&self) -> u64 {
        self.updated + self.conflicted + self.errored + self.unchanged
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped_offline {
            return f.write_str("skipped (offline)");
        }
        write!(
            f,
            "{} updated, {} conflicted, {} errored, {} unchanged",
            self.updated, self.conflicted, self.errored, self.unchanged
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}
