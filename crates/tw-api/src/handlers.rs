//! # tw-api Handlers
//!
//! Each handler maps one HTTP request onto one `DocumentStore` operation and
//! returns the store result as-is.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tw_core::error::AppError;
use tw_core::models::{Collection, Document, InsertOutcome, InsertResult, RecordId, SortOrder, TAGS_FIELD, UP_VOTE_FIELD};
use tw_core::traits::{DocumentStore, TokenIssuer};

use crate::error::ApiError;
use crate::middleware::RequireToken;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tokens: Arc<dyn TokenIssuer>,
    /// Whether `RequireToken` actually checks the bearer token.
    pub enforce_auth: bool,
}

/// Body of every vote patch: the client computes the new total.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdate {
    pub up_vote: i64,
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Liveness probe, no store access.
pub async fn index() -> &'static str {
    "Tech world server is running"
}

pub async fn list_features(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.store.find_all(Collection::Featured, None).await?))
}

pub async fn patch_feature_vote(
    State(state): State<AppState>,
    _auth: RequireToken,
    Path(id): Path<String>,
    Json(vote): Json<VoteUpdate>,
) -> Result<Response, ApiError> {
    patch_vote(&state, Collection::Featured, id, vote).await
}

/// Most votes first; `?query=largest` flips to ascending.
pub async fn list_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let order = match params.query.as_deref() {
        Some("largest") => SortOrder::ascending(UP_VOTE_FIELD),
        _ => SortOrder::descending(UP_VOTE_FIELD),
    };
    Ok(Json(state.store.find_all(Collection::Trending, Some(order)).await?))
}

pub async fn patch_trending_vote(
    State(state): State<AppState>,
    _auth: RequireToken,
    Path(id): Path<String>,
    Json(vote): Json<VoteUpdate>,
) -> Result<Response, ApiError> {
    patch_vote(&state, Collection::Trending, id, vote).await
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> Result<Json<InsertResult>, ApiError> {
    guarded_insert(&state, Collection::Users, body, "User already exist").await
}

/// Returns the user document, or JSON `null` when no user has that email.
pub async fn get_admin_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<Document>>, ApiError> {
    Ok(Json(state.store.find_one(Collection::Users, "email", &email).await?))
}

/// Tag search; an absent or empty `search` lists every product.
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let products = match params.search.as_deref().filter(|needle| !needle.is_empty()) {
        Some(needle) => state.store.find_matching(Collection::Products, TAGS_FIELD, needle).await?,
        None => state.store.find_all(Collection::Products, None).await?,
    };
    Ok(Json(products))
}

pub async fn list_all_products(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.store.find_all(Collection::Products, None).await?))
}

pub async fn patch_product_vote(
    State(state): State<AppState>,
    _auth: RequireToken,
    Path(id): Path<String>,
    Json(vote): Json<VoteUpdate>,
) -> Result<Response, ApiError> {
    patch_vote(&state, Collection::Products, id, vote).await
}

pub async fn create_review(
    State(state): State<AppState>,
    _auth: RequireToken,
    Json(body): Json<Document>,
) -> Result<Json<InsertResult>, ApiError> {
    match state.store.insert(Collection::Reviews, body).await? {
        InsertOutcome::Inserted(result) => {
            tracing::info!(collection = %Collection::Reviews, id = %result.inserted_id, "document inserted");
            Ok(Json(result))
        }
        InsertOutcome::Duplicate => Err(anyhow::anyhow!("store reported a duplicate review, which has no unique key").into()),
    }
}

pub async fn list_reviews(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.store.find_all(Collection::Reviews, None).await?))
}

pub async fn create_report(
    State(state): State<AppState>,
    _auth: RequireToken,
    Json(body): Json<Document>,
) -> Result<Json<InsertResult>, ApiError> {
    guarded_insert(&state, Collection::Reported, body, "already reported").await
}

/// Signs the posted JSON object into a bearer token.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(claims): Json<Document>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.tokens.issue(claims)?;
    Ok(Json(TokenResponse { token }))
}

/// Sets `up_vote` verbatim. An id that resolves to nothing answers 404 with
/// the zero-match update result so clients still see what happened.
async fn patch_vote(state: &AppState, collection: Collection, id: String, vote: VoteUpdate) -> Result<Response, ApiError> {
    let id = RecordId::from(id);
    let result = state
        .store
        .set_field(collection, &id, UP_VOTE_FIELD, Value::from(vote.up_vote))
        .await?;

    if !result.is_matched() {
        tracing::debug!(%collection, %id, "vote patch matched no document");
        return Ok((StatusCode::NOT_FOUND, Json(result)).into_response());
    }

    tracing::info!(%collection, %id, up_vote = vote.up_vote, "vote updated");
    Ok(Json(result).into_response())
}

/// Inserts `body`, turning a unique-key collision into a 409 with
/// `conflict_message`. The key field must be a non-empty string.
async fn guarded_insert(
    state: &AppState,
    collection: Collection,
    body: Document,
    conflict_message: &str,
) -> Result<Json<InsertResult>, ApiError> {
    if let Some(key) = collection.unique_key() {
        require_string_field(&body, key)?;
    }

    match state.store.insert(collection, body).await? {
        InsertOutcome::Inserted(result) => {
            tracing::info!(%collection, id = %result.inserted_id, "document inserted");
            Ok(Json(result))
        }
        InsertOutcome::Duplicate => Err(AppError::Conflict(conflict_message.to_string()).into()),
    }
}

fn require_string_field(body: &Document, field: &str) -> Result<(), AppError> {
    match body.get(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(()),
        _ => Err(AppError::ValidationError(format!("`{field}` must be a non-empty string"))),
    }
}
