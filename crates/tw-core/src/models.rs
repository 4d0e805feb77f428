//! # Domain Models
//!
//! Tech World stores loosely typed JSON documents. Apart from the record id and
//! the unique business keys, the server does not interpret document fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A schema-less JSON object as stored in a collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the store-assigned record id in every document.
pub const ID_FIELD: &str = "_id";

/// Field holding the client-supplied vote counter.
pub const UP_VOTE_FIELD: &str = "up_vote";

/// Field holding the searchable product tags.
pub const TAGS_FIELD: &str = "tags";

/// The named collections backing each route family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Featured,
    Trending,
    Users,
    Products,
    Reviews,
    Reported,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Featured,
        Collection::Trending,
        Collection::Users,
        Collection::Products,
        Collection::Reviews,
        Collection::Reported,
    ];

    /// Physical collection name inside the store.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Featured => "featured",
            Collection::Trending => "trending",
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Reviews => "reviews",
            Collection::Reported => "reported",
        }
    }

    /// The business key that must be unique within this collection, if any.
    ///
    /// Stores back this with a unique index so that a duplicate insert fails
    /// atomically instead of relying on a prior lookup.
    pub fn unique_key(&self) -> Option<&'static str> {
        match self {
            Collection::Users => Some("email"),
            Collection::Reported => Some("reportedId"),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque store-assigned identifier, as received in a request path.
///
/// No format is assumed here; each store decides whether the value can
/// resolve to one of its documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-field ordering for fetch-list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Ascending }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Descending }
    }
}

/// Metadata returned after a successful insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: RecordId,
}

impl InsertResult {
    pub fn new(inserted_id: RecordId) -> Self {
        Self { acknowledged: true, inserted_id }
    }
}

/// Outcome of an insert into a collection that may carry a unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(InsertResult),
    /// Another document already holds the collection's unique key value.
    Duplicate,
}

/// Metadata returned by a single-document field update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<RecordId>,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self { acknowledged: true, matched_count, modified_count, upserted_id: None }
    }

    /// Result for an id that does not resolve to any document.
    pub fn unmatched() -> Self {
        Self::new(0, 0)
    }

    pub fn is_matched(&self) -> bool {
        self.matched_count > 0
    }
}
