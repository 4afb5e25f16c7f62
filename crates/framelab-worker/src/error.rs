//! Worker error types.

use thiserror::Error;

use framelab_db::DbError;
use framelab_media::MediaError;
use framelab_ml_client::MlError;
use framelab_queue::QueueError;
use framelab_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// How a failure should be treated by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; never retried
    Validation,
    /// Referenced entity is missing; never retried
    NotFound,
    /// I/O or service failure; retried per the job's policy
    Transient,
    /// Anything retrying cannot fix
    Fatal,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job exceeded hard time limit of {0}s")]
    Timeout(u64),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Inference error: {0}")]
    Ml(#[from] MlError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Validation(_) => ErrorKind::Validation,
            WorkerError::NotFound(_) => ErrorKind::NotFound,
            WorkerError::Timeout(_) | WorkerError::Io(_) | WorkerError::Queue(_) => {
                ErrorKind::Transient
            }
            WorkerError::JobFailed(_) => ErrorKind::Fatal,
            WorkerError::Storage(e) if e.is_not_found() => ErrorKind::NotFound,
            WorkerError::Storage(StorageError::Config(_)) => ErrorKind::Fatal,
            WorkerError::Storage(_) => ErrorKind::Transient,
            WorkerError::Db(DbError::NotFound(_)) => ErrorKind::NotFound,
            WorkerError::Db(
                DbError::Transition(_) | DbError::Config(_) | DbError::Unauthorized(_),
            ) => ErrorKind::Fatal,
            WorkerError::Db(_) => ErrorKind::Transient,
            WorkerError::Media(e) if e.is_permanent() => ErrorKind::Fatal,
            WorkerError::Media(_) => ErrorKind::Transient,
            WorkerError::Ml(_) => ErrorKind::Transient,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelab_models::{TransitionError, VideoStatus};
    use framelab_storage::Operation;

    #[test]
    fn test_error_kinds() {
        assert_eq!(WorkerError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            WorkerError::from(StorageError::not_found("k")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            WorkerError::from(StorageError::request(Operation::Get, "k", "connection reset")).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            WorkerError::from(DbError::ServerError(503, "x".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            WorkerError::from(DbError::from(TransitionError::NotProcessing {
                current: VideoStatus::Ready
            }))
            .kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            WorkerError::from(MediaError::invalid_video("zero duration")).kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            WorkerError::from(MlError::ServiceUnavailable("x".into())).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(WorkerError::Timeout(3600).is_retryable());
        assert!(!WorkerError::not_found("videos/v1").is_retryable());
    }
}
