//! # Host Bridge Traits
//!
//! Collaborator abstractions that the offline cache core consumes but does
//! not implement itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the offline recipe cache and the
//! surrounding application. Each trait represents a capability the core needs
//! but whose implementation belongs to the host: the remote recipe store, the
//! connectivity signal, binary asset retrieval, and user-facing notification.
//!
//! ## Traits
//!
//! - [`RemoteRecipeStore`](remote::RemoteRecipeStore) - Versioned recipe
//!   records by id, with opportunistic paged listing
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection,
//!   consulted before any reconciliation pass
//! - [`AssetFetcher`](assets::AssetFetcher) - Opaque image-blob retrieval by
//!   URL
//! - [`NotificationSink`](notify::NotificationSink) - Human-readable summary
//!   delivery; failures are never fatal
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations should convert their platform-specific failures into it
//! and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared across async tasks behind `Arc`.

pub mod assets;
pub mod error;
pub mod network;
pub mod notify;
pub mod remote;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use assets::AssetFetcher;
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus};
pub use notify::NotificationSink;
pub use remote::{RecipeId, RecipePage, RemoteRecipe, RemoteRecipeStore};
pub use time::{Clock, SystemClock};
