//! Error Handling Utilities
//!
//! The error taxonomy shared by every service in the crate, plus the HTTP
//! translation applied at the API boundary.

use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;

/// Main application error type; every service operation resolves to one of
/// these variants at the orchestrator boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input, rejected before touching any state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced identity, session, or token is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate registration or already-consumed token
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Abuse guard denial; carries the caller-facing retry hint
    #[error("Rate limit exceeded, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// Wrong password or code. Deliberately the same shape for "no such
    /// account" so callers cannot enumerate identities.
    #[error("Invalid credentials")]
    InvalidCredential,

    /// A TTL elapsed (code, reset token, or signed credential)
    #[error("Expired: {0}")]
    Expired(String),

    /// Attempt limit reached; the challenge is locked out
    #[error("Too many attempts")]
    AttemptsExceeded,

    /// Valid credential but insufficient scope for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache collaborator errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Password hashing errors
    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// Generic internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Standard error response structure for API endpoints
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            retry_after: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIAL",
                "Invalid credentials".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Expired(msg) => (StatusCode::GONE, "EXPIRED", msg.clone()),
            AppError::RateLimited {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Too many requests, retry in {retry_after_seconds} seconds"),
            ),
            AppError::AttemptsExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "ATTEMPTS_EXCEEDED",
                "Too many attempts, request a new code".to_string(),
            ),
            AppError::Database(e) => {
                log::error!("database failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Cache(e) => {
                log::error!("cache failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Hashing(e) => {
                log::error!("password hashing failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                log::error!("internal failure: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = ErrorResponse::new(error_code, &message);
        if let AppError::RateLimited {
            retry_after_seconds,
        } = &self
        {
            body.retry_after = Some(*retry_after_seconds);
            let mut response = (status, Json(body)).into_response();
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            return response;
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for operations that can return AppError
pub type AppResult<T> = Result<T, AppError>;
