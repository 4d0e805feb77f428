//! techworld/crates/tw-api/src/middleware.rs Middleware
//!
//! Request logging, CORS, and the bearer-token guard for mutating routes.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Method},
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tw_core::error::AppError;
use tw_core::models::Document;

use crate::error::ApiError;
use crate::handlers::AppState;

const UNAUTHORIZED_MESSAGE: &str = "unauthorized access";

/// Logs one span per request with method, path, status and latency.
pub fn standard_middleware() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

// The web client is served from a different origin than the API.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Guard for mutating routes.
///
/// Passes through untouched unless `AppState::enforce_auth` is set; then it
/// requires `Authorization: Bearer <token>` with a token accepted by the
/// configured `TokenIssuer`, and carries the verified claims.
pub struct RequireToken(pub Option<Document>);

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !state.enforce_auth {
            return Ok(Self(None));
        }

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string()))?;

        let claims = state.tokens.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "bearer token rejected");
            AppError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string())
        })?;

        Ok(Self(Some(claims)))
    }
}
