//! Error types for the course cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache, peer transport and booking paths.
///
/// `Clone` so a single in-flight load can hand the same failure to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Named group or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation is reserved for the coordinating node
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network failure or deadline exceeded while reaching a peer
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backing store failed while filling a cache miss
    #[error("Loader error: {0}")]
    Loader(String),

    /// Relational store failure outside of a load
    #[error("Store error: {0}")]
    Store(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Transport failures are the only ones a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Transport(_))
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CacheError::Transport(format!("peer request timed out: {}", err))
        } else {
            CacheError::Transport(err.to_string())
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            CacheError::Transport(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            CacheError::Loader(msg) | CacheError::Store(msg) | CacheError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the course cache.
pub type Result<T> = std::result::Result<T, CacheError>;
