//! Relational store error types.

use framelab_models::TransitionError;
use thiserror::Error;

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            409 => Self::Conflict(body),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(body),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DbError::Unauthorized(_) => Some(401),
            DbError::NotFound(_) => Some(404),
            DbError::Conflict(_) => Some(409),
            DbError::RateLimited(_) => Some(429),
            DbError::ServerError(status, _) => Some(*status),
            DbError::RequestFailed(_) => Some(400),
            DbError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Network(_) | DbError::RateLimited(_) | DbError::ServerError(..)
        )
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            DbError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(DbError::from_http_status(404, "x"), DbError::NotFound(_)));
        assert!(matches!(DbError::from_http_status(409, "x"), DbError::Conflict(_)));
        assert!(matches!(DbError::from_http_status(503, "x"), DbError::ServerError(503, _)));
        assert!(matches!(DbError::from_http_status(400, "x"), DbError::RequestFailed(_)));
        assert!(matches!(DbError::from_http_status(403, "x"), DbError::Unauthorized(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::from_http_status(502, "bad gateway").is_retryable());
        assert!(DbError::from_http_status(429, "slow down").is_retryable());
        assert!(!DbError::from_http_status(400, "bad request").is_retryable());
        assert!(!DbError::not_found("videos/v1").is_retryable());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(DbError::RateLimited(10).http_status(), Some(429));
        assert_eq!(DbError::ServerError(502, "x".into()).http_status(), Some(502));
        assert_eq!(DbError::config("x").http_status(), None);
    }
}
