//! # tw-db-mongo
//!
//! MongoDB implementation of `DocumentStore`.
//!
//! Documents cross the boundary as relaxed extended JSON, with the `_id`
//! ObjectId flattened to its hex string so clients can echo it back in paths.

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Database, IndexModel};
use serde_json::Value;
use tw_core::models::{
    Collection, Document, InsertOutcome, InsertResult, RecordId, SortDirection, SortOrder, UpdateResult, ID_FIELD,
};
use tw_core::traits::DocumentStore;

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

pub struct MongoDocumentStore {
    client: Client,
    db: Database,
}

impl MongoDocumentStore {
    /// Connects with Stable API v1, verifies the deployment and creates the
    /// unique indexes backing guarded inserts.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        options.app_name = Some("techworld".to_string());

        let store = Self::from_client(Client::with_options(options)?, db_name);
        store.ping().await?;
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Wraps an existing client without touching the server.
    pub fn from_client(client: Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self { client, db }
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<BsonDocument> {
        self.db.collection(collection.name())
    }

    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        for collection in Collection::ALL {
            if let Some(key) = collection.unique_key() {
                let mut keys = BsonDocument::new();
                keys.insert(key, 1);
                let index = IndexModel::builder()
                    .keys(keys)
                    .options(IndexOptions::builder().unique(true).build())
                    .build();
                // Fails on data written before the index existed if it holds
                // duplicates; those have to be removed by hand.
                self.collection(collection)
                    .create_index(index)
                    .await
                    .with_context(|| format!("creating unique index on {collection}.{key}"))?;
                tracing::debug!(%collection, key, "unique index ensured");
            }
        }
        Ok(())
    }
}

fn sort_document(order: &SortOrder) -> BsonDocument {
    let mut sort = BsonDocument::new();
    let direction = match order.direction {
        SortDirection::Ascending => 1,
        SortDirection::Descending => -1,
    };
    sort.insert(order.field.as_str(), direction);
    sort
}

/// Case-insensitive substring filter. The needle is regex-escaped so user
/// input is always matched literally.
fn contains_filter(field: &str, needle: &str) -> BsonDocument {
    let mut filter = BsonDocument::new();
    filter.insert(field, doc! { "$regex": regex::escape(needle), "$options": "i" });
    filter
}

fn to_json_document(mut document: BsonDocument) -> anyhow::Result<Document> {
    if let Ok(oid) = document.get_object_id(ID_FIELD) {
        document.insert(ID_FIELD, oid.to_hex());
    }
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a document, got {other}"),
    }
}

/// Record ids are assigned by the server; a client-supplied `_id` is dropped.
fn to_bson_document(mut document: Document) -> anyhow::Result<BsonDocument> {
    document.remove(ID_FIELD);
    Ok(bson::to_document(&document)?)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find_all(&self, collection: Collection, sort: Option<SortOrder>) -> anyhow::Result<Vec<Document>> {
        let coll = self.collection(collection);
        let mut find = coll.find(doc! {});
        if let Some(order) = sort {
            find = find.sort(sort_document(&order));
        }
        let documents: Vec<BsonDocument> = find.await?.try_collect().await?;
        documents.into_iter().map(to_json_document).collect()
    }

    async fn find_matching(&self, collection: Collection, field: &str, needle: &str) -> anyhow::Result<Vec<Document>> {
        let documents: Vec<BsonDocument> = self
            .collection(collection)
            .find(contains_filter(field, needle))
            .await?
            .try_collect()
            .await?;
        documents.into_iter().map(to_json_document).collect()
    }

    async fn find_one(&self, collection: Collection, field: &str, value: &str) -> anyhow::Result<Option<Document>> {
        let mut filter = BsonDocument::new();
        filter.insert(field, value);
        self.collection(collection)
            .find_one(filter)
            .await?
            .map(to_json_document)
            .transpose()
    }

    async fn insert(&self, collection: Collection, document: Document) -> anyhow::Result<InsertOutcome> {
        let document = to_bson_document(document)?;
        match self.collection(collection).insert_one(document).await {
            Ok(result) => {
                let id = match result.inserted_id.as_object_id() {
                    Some(oid) => oid.to_hex(),
                    None => result.inserted_id.to_string(),
                };
                Ok(InsertOutcome::Inserted(InsertResult::new(RecordId::new(id))))
            }
            Err(err) if is_duplicate_key(&err) => {
                tracing::debug!(%collection, "insert rejected by unique index");
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn set_field(&self, collection: Collection, id: &RecordId, field: &str, value: Value) -> anyhow::Result<UpdateResult> {
        anyhow::ensure!(field != ID_FIELD, "record ids are immutable");

        // A malformed ObjectId cannot name any document.
        let Ok(oid) = ObjectId::parse_str(id.as_str()) else {
            return Ok(UpdateResult::unmatched());
        };

        let mut set = BsonDocument::new();
        set.insert(field, bson::to_bson(&value)?);

        let result = self
            .collection(collection)
            .update_one(doc! { "_id": oid }, doc! { "$set": set })
            .await?;
        Ok(UpdateResult::new(result.matched_count, result.modified_count))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!("mongodb client shut down");
    }
}
