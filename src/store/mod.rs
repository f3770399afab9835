//! Destination-side storage: the collaborator traits the sync engine
//! writes through, plus the SQLite implementation.
//!
//! The engine never talks to SQLite directly; everything goes through
//! [`ContentStore`] and [`AssetStore`] so the destination can be swapped
//! (tests use the in-memory SQLite variant).

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Metadata key holding the source record id.
pub const META_EXTERNAL_ID: &str = "external_id";
/// Metadata key holding the detected source modification timestamp.
pub const META_LAST_MODIFIED: &str = "last_modified";
/// Metadata key holding the wall-clock time of the last successful write.
pub const META_LAST_SYNCED: &str = "last_synced";

/// Identifier of an imported binary asset.
pub type AssetRef = i64;

/// Errors from the destination store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("write rejected: {0}")]
    Write(String),

    #[error("asset import failed: {0}")]
    Import(String),

    #[error("no content item with id {0}")]
    ItemNotFound(i64),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Publication state of a content item.
///
/// Orphaned items are drafted, never deleted, so a source-side mistake
/// can be undone by re-adding the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Published,
    Draft,
}

impl ContentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

/// A destination content item, as returned by lookups.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: i64,
    pub content_type: String,
    pub status: ContentStatus,
}

/// The registered content model: what the destination accepts.
///
/// Declared in the config file, registered by `airsync init`, and used
/// as the referent for mapping validation. An empty `custom_fields` map
/// means no custom-field registry is present, in which case custom-field
/// key checks are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentModel {
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub taxonomies: Vec<String>,
    /// Content type → registered custom-field keys.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Vec<String>>,
}

impl ContentModel {
    #[must_use]
    pub fn has_content_type(&self, content_type: &str) -> bool {
        self.content_types.iter().any(|ct| ct == content_type)
    }

    #[must_use]
    pub fn has_taxonomy(&self, taxonomy: &str) -> bool {
        self.taxonomies.iter().any(|t| t == taxonomy)
    }

    /// Whether a custom-field key is registered for a content type.
    ///
    /// Returns `None` when no registry is declared at all; callers skip
    /// the check in that case rather than failing every mapping.
    #[must_use]
    pub fn custom_field_registered(&self, content_type: &str, key: &str) -> Option<bool> {
        if self.custom_fields.is_empty() {
            return None;
        }
        Some(
            self.custom_fields
                .get(content_type)
                .is_some_and(|keys| keys.iter().any(|k| k == key)),
        )
    }
}

/// Destination content storage, keyed by `(content_type, external_id)`.
///
/// At most one item holds a given pair at any time; `find_by_external_id`
/// is the lookup the engine runs before deciding create vs. update.
pub trait ContentStore {
    /// Look up an item by its external-id marker, regardless of status.
    fn find_by_external_id(
        &self,
        content_type: &str,
        external_id: &str,
    ) -> StoreResult<Option<ContentItem>>;

    /// Create an item with the given core attributes, status `published`.
    fn create(&mut self, content_type: &str, attrs: &Map<String, Value>) -> StoreResult<i64>;

    /// Merge core attributes into an existing item; unspecified keys survive.
    fn update(&mut self, item_id: i64, attrs: &Map<String, Value>) -> StoreResult<()>;

    /// Transition an item's publication status.
    fn set_status(&mut self, item_id: i64, status: ContentStatus) -> StoreResult<()>;

    /// Upsert one metadata entry (sync markers live here).
    fn set_metadata(&mut self, item_id: i64, key: &str, value: &str) -> StoreResult<()>;

    /// Read one metadata entry.
    fn get_metadata(&self, item_id: i64, key: &str) -> StoreResult<Option<String>>;

    /// Upsert one custom-field value.
    fn set_custom_field(&mut self, item_id: i64, key: &str, value: &Value) -> StoreResult<()>;

    /// Replace the full term set for `(item, taxonomy)`.
    fn assign_taxonomy_terms(
        &mut self,
        item_id: i64,
        taxonomy: &str,
        terms: &[String],
    ) -> StoreResult<()>;

    /// Point the item's featured-asset slot at an imported asset.
    fn assign_featured_asset(&mut self, item_id: i64, asset: AssetRef) -> StoreResult<()>;

    /// Ids of all published items of a content type that carry an
    /// external-id marker. Items without the marker are never candidates
    /// for orphan reconciliation.
    fn list_published_with_external_id(&self, content_type: &str) -> StoreResult<Vec<i64>>;

    /// External id of an item, if it has one.
    fn get_external_id(&self, item_id: i64) -> StoreResult<Option<String>>;

    /// The registered content model.
    fn content_model(&self) -> StoreResult<ContentModel>;
}

/// Binary asset storage.
pub trait AssetStore {
    /// Import a staged file into the asset store, returning its reference.
    ///
    /// The staged file at `tmp_path` is owned by the caller and removed
    /// by the caller regardless of the outcome.
    fn import(
        &mut self,
        tmp_path: &Path,
        filename: &str,
        mime_hint: Option<&str>,
    ) -> StoreResult<AssetRef>;
}
