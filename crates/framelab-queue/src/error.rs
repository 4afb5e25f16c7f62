//! Queue errors.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The same logical submission is still live under this idempotency key
    #[error("already queued: {0}")]
    Duplicate(String),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::Duplicate(_))
    }
}
