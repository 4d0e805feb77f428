//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Collection, Document, InsertOutcome, RecordId, SortOrder, UpdateResult};

/// Data persistence contract for the document collections.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round trip to the backend; used once at startup.
    async fn ping(&self) -> anyhow::Result<()>;

    // Read Operations
    async fn find_all(&self, collection: Collection, sort: Option<SortOrder>) -> anyhow::Result<Vec<Document>>;

    /// Documents whose `field` contains `needle`, ignoring case.
    async fn find_matching(&self, collection: Collection, field: &str, needle: &str) -> anyhow::Result<Vec<Document>>;

    /// First document whose `field` equals `value`.
    async fn find_one(&self, collection: Collection, field: &str, value: &str) -> anyhow::Result<Option<Document>>;

    // Write Operations

    /// Inserts `document` under a fresh record id. Any `_id` already present is
    /// discarded. Collections with a unique key report `Duplicate` instead of
    /// inserting when the key is already taken.
    async fn insert(&self, collection: Collection, document: Document) -> anyhow::Result<InsertOutcome>;

    /// Sets a single field on the document identified by `id`. Never creates
    /// a document: an unresolvable id yields `UpdateResult::unmatched()`.
    async fn set_field(&self, collection: Collection, id: &RecordId, field: &str, value: Value) -> anyhow::Result<UpdateResult>;

    /// Releases backend connections. Called once after the server stops.
    async fn close(&self);
}

/// Bearer token contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenIssuer: Send + Sync {
    /// Signs `claims` into a token, stamping `iat` and `exp`.
    fn issue(&self, claims: Document) -> anyhow::Result<String>;

    /// Validates signature and expiry, returning the embedded claims.
    fn verify(&self, token: &str) -> anyhow::Result<Document>;
}
