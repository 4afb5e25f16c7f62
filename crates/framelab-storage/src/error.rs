//! Storage errors.

use std::fmt;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Object operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Put,
    Get,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Put => "put",
            Operation::Get => "get",
            Operation::Delete => "delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage not configured: {0}")]
    Config(String),

    #[error("no object at {0}")]
    NotFound(String),

    #[error("{op} {key}: {message}")]
    Request {
        op: Operation,
        key: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn request(op: Operation, key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Request {
            op,
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
