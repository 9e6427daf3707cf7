//! User Notification Abstraction
//!
//! Receives human-readable summary strings after reconciliation. Delivery is
//! best-effort by contract: a sink failure is logged by the caller and never
//! propagated.

use async_trait::async_trait;

use crate::error::Result;

/// Notification sink trait
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a short, human-readable message to the user.
    async fn notify(&self, message: &str) -> Result<()>;
}
