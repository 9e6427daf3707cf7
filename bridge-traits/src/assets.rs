//! Binary Asset Retrieval Abstraction
//!
//! The cache stores a recipe's primary image as an opaque blob keyed by its
//! URL. How the bytes are obtained (HTTP client, CDN SDK, test fixture) is
//! the host's concern.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Asset fetcher trait
///
/// A failed fetch downgrades the pin to `has_asset = false`; it never fails
/// the pin itself. Implementations should still return errors faithfully so
/// the cache can log the cause.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the asset bytes at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}
