//! # AppError
//!
//! Centralized error handling for the Tech World server.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type surfaced by request handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation failure (e.g., missing business key in a request body)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or rejected bearer token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., store unreachable, signing failure)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists (e.g., duplicate user email).
    /// The payload is the client-facing message.
    #[error("{0}")]
    Conflict(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Tech World logic.
pub type Result<T> = std::result::Result<T, AppError>;
