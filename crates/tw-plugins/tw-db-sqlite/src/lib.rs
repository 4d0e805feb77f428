//! # tw-db-sqlite Implementation
//!
//! Stores every collection in a single `documents` table: one JSON body per
//! row, tagged with its collection name. Insertion order is kept by the
//! autoincrement `seq` column, which is the store-native order for listings.
//!
//! Unique business keys are backed by partial expression indexes so that a
//! duplicate insert fails inside SQLite rather than after a separate lookup.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tw_core::models::{
    Collection, Document, InsertOutcome, InsertResult, RecordId, SortDirection, SortOrder, UpdateResult, ID_FIELD,
};
use tw_core::traits::DocumentStore;
use uuid::Uuid;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database at `url` and prepares the schema.
    ///
    /// `sqlite::memory:` databases live as long as their connection, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                body       TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS documents_collection ON documents (collection, seq)")
            .execute(&self.pool)
            .await?;

        for collection in Collection::ALL {
            if let Some(key) = collection.unique_key() {
                // Names come from `Collection`, never from user input.
                let ddl = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {name}_{key}_unique \
                     ON documents (json_extract(body, '{path}')) \
                     WHERE collection = '{name}'",
                    name = collection.name(),
                    key = key,
                    path = json_path(key),
                );
                sqlx::query(&ddl).execute(&self.pool).await?;
            }
        }

        tracing::debug!("sqlite document schema ready");
        Ok(())
    }

    async fn fetch_bodies(&self, sql: &str, collection: Collection, path: Option<String>) -> anyhow::Result<Vec<Document>> {
        let mut query = sqlx::query(sql).bind(collection.name());
        if let Some(path) = path {
            query = query.bind(path);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| parse_body(&row.get::<String, _>("body")))
            .collect()
    }
}

/// JSON path addressing a top-level field, quoted so any key name is valid.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn parse_body(body: &str) -> anyhow::Result<Document> {
    Ok(serde_json::from_str(body)?)
}

/// Case-insensitive containment; arrays match when any element does.
fn contains_ignore_case(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| contains_ignore_case(item, needle)),
        _ => false,
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Missing sort fields compare lowest, matching document-database semantics.
    async fn find_all(&self, collection: Collection, sort: Option<SortOrder>) -> anyhow::Result<Vec<Document>> {
        match sort {
            None => {
                self.fetch_bodies("SELECT body FROM documents WHERE collection = ? ORDER BY seq", collection, None)
                    .await
            }
            Some(order) => {
                let sql = match order.direction {
                    SortDirection::Ascending => {
                        "SELECT body FROM documents WHERE collection = ? ORDER BY json_extract(body, ?) ASC, seq"
                    }
                    SortDirection::Descending => {
                        "SELECT body FROM documents WHERE collection = ? ORDER BY json_extract(body, ?) DESC, seq"
                    }
                };
                self.fetch_bodies(sql, collection, Some(json_path(&order.field))).await
            }
        }
    }

    async fn find_matching(&self, collection: Collection, field: &str, needle: &str) -> anyhow::Result<Vec<Document>> {
        let needle = needle.to_lowercase();
        let documents = self
            .fetch_bodies("SELECT body FROM documents WHERE collection = ? ORDER BY seq", collection, None)
            .await?;

        Ok(documents
            .into_iter()
            .filter(|doc| doc.get(field).is_some_and(|value| contains_ignore_case(value, &needle)))
            .collect())
    }

    async fn find_one(&self, collection: Collection, field: &str, value: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT body FROM documents WHERE collection = ? AND json_extract(body, ?) = ? ORDER BY seq LIMIT 1",
        )
        .bind(collection.name())
        .bind(json_path(field))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| parse_body(&row.get::<String, _>("body"))).transpose()
    }

    async fn insert(&self, collection: Collection, mut document: Document) -> anyhow::Result<InsertOutcome> {
        let id = Uuid::now_v7().simple().to_string();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        let body = serde_json::to_string(&document)?;

        let result = sqlx::query("INSERT INTO documents (id, collection, body) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(collection.name())
            .bind(body)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(InsertResult::new(RecordId::new(id)))),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                tracing::debug!(%collection, "insert rejected by unique index");
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Single-statement update: the row only changes when the stored value
    /// differs, so `rows_affected` is the modified count. A follow-up existence
    /// check tells "already equal" apart from "no such document".
    async fn set_field(&self, collection: Collection, id: &RecordId, field: &str, value: Value) -> anyhow::Result<UpdateResult> {
        anyhow::ensure!(field != ID_FIELD, "record ids are immutable");

        let modified = sqlx::query(
            "UPDATE documents SET body = json_set(body, ?1, json(?2)) \
             WHERE collection = ?3 AND id = ?4 \
             AND json_extract(body, ?1) IS NOT json_extract(?2, '$')",
        )
        .bind(json_path(field))
        .bind(serde_json::to_string(&value)?)
        .bind(collection.name())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if modified > 0 {
            return Ok(UpdateResult::new(modified, modified));
        }

        let exists = sqlx::query("SELECT 1 FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.name())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        Ok(if exists { UpdateResult::new(1, 0) } else { UpdateResult::unmatched() })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
