//! Remote Recipe Store Abstraction
//!
//! The cache core never talks to the network directly; it reads versioned
//! recipe records through this trait. A record that the remote can no longer
//! find (`get_by_id` returning `Ok(None)`) is the tombstone signal the
//! reconciliation engine turns into a conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Identifier of a recipe record in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecipeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A full recipe record as the remote store returns it.
///
/// `updated_at` is optional because some backends only stamp creation time.
/// Version comparison falls back to `created_at` in that case (see the
/// reconciliation engine for the consequences).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecipe {
    /// Remote identifier, unique in the remote store
    pub id: RecipeId,
    /// Recipe title
    pub title: String,
    /// Free-form description
    pub description: Option<String>,
    /// Ingredient lines, in display order
    pub ingredients: Vec<String>,
    /// Instruction steps, in display order
    pub instructions: Vec<String>,
    /// Primary image URL, if the recipe has one
    pub image_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, when the backend tracks one
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecipe {
    /// Monotonic version stamp for staleness comparison.
    ///
    /// Derived from `updated_at`, falling back to `created_at` when the
    /// backend never populates an update timestamp.
    pub fn version(&self) -> i64 {
        self.updated_at
            .unwrap_or(self.created_at)
            .timestamp_millis()
    }
}

/// One page of a remote listing.
#[derive(Debug, Clone)]
pub struct RecipePage {
    pub records: Vec<RemoteRecipe>,
    /// Token for the next page; `None` when this is the last page
    pub next_page_token: Option<String>,
}

/// Remote recipe store trait
///
/// Implementations wrap whatever transport the host uses (hosted database
/// SDK, REST client, test double). Transient transport failures should map to
/// [`BridgeError::RemoteUnavailable`](crate::BridgeError::RemoteUnavailable)
/// so the reconciliation engine can record them per record instead of
/// aborting a pass.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::{RecipeId, RemoteRecipeStore};
///
/// async fn exists(store: &dyn RemoteRecipeStore, id: &RecipeId) -> bool {
///     matches!(store.get_by_id(id).await, Ok(Some(_)))
/// }
/// ```
#[async_trait]
pub trait RemoteRecipeStore: Send + Sync {
    /// Fetch the current remote record for `id`.
    ///
    /// Returns `Ok(None)` when the record does not exist remotely (including
    /// server-side deletion of a record that existed before).
    async fn get_by_id(&self, id: &RecipeId) -> Result<Option<RemoteRecipe>>;

    /// List remote records, one page at a time.
    ///
    /// Used opportunistically; reconciliation primarily drives `get_by_id`
    /// per pinned record.
    async fn list(&self, page_token: Option<String>) -> Result<RecipePage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_version_prefers_updated_at() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let recipe = RemoteRecipe {
            id: RecipeId::new("r1"),
            title: "Bread".to_string(),
            description: None,
            ingredients: vec![],
            instructions: vec![],
            image_url: None,
            created_at: created,
            updated_at: Some(updated),
        };

        assert_eq!(recipe.version(), updated.timestamp_millis());
    }

    #[test]
    fn test_version_falls_back_to_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let recipe = RemoteRecipe {
            id: RecipeId::new("r1"),
            title: "Bread".to_string(),
            description: None,
            ingredients: vec![],
            instructions: vec![],
            image_url: None,
            created_at: created,
            updated_at: None,
        };

        assert_eq!(recipe.version(), created.timestamp_millis());
    }
}
