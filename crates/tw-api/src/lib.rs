//! # tw-api
//!
//! The web routing layer for the Tech World server.

pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    routing::{get, patch, post},
    Router,
};

pub use handlers::AppState;

/// Builds the full route table.
///
/// Paths keep the shape the web client already calls, including the
/// singular `/product/{id}` and camel-cased `/allProducts`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/features", get(handlers::list_features))
        .route("/features/{id}", patch(handlers::patch_feature_vote))
        .route("/trending", get(handlers::list_trending))
        .route("/trending/{id}", patch(handlers::patch_trending_vote))
        .route("/users", post(handlers::create_user))
        .route("/user/admin/{email}", get(handlers::get_admin_user))
        .route("/products", get(handlers::search_products))
        .route("/allProducts", get(handlers::list_all_products))
        .route("/product/{id}", patch(handlers::patch_product_vote))
        .route("/reviews", get(handlers::list_reviews).post(handlers::create_review))
        .route("/reports", post(handlers::create_report))
        .route("/jwt", post(handlers::issue_token))
        .with_state(state)
        .layer(middleware::cors_policy())
        .layer(middleware::standard_middleware())
}
