//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the offline recipe cache:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the cache and reconciliation
//! crates depend on. It establishes the logging conventions, the fail-fast
//! configuration builder that wires host bridges in, and the event
//! broadcasting mechanism the UI layer subscribes to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CacheEvent, CoreEvent, EventBus, SyncEvent};
