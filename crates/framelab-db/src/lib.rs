//! Relational store access for FrameLab.
//!
//! Talks to a PostgREST endpoint with the service-role key, so worker
//! operations bypass per-user row policies. Pipeline code depends on the
//! [`Catalog`] trait rather than on the HTTP client.

pub mod catalog;
pub mod client;
pub mod error;
pub mod metrics;
pub mod query;
pub mod retry;
pub mod types;

pub use catalog::{truncate_error_message, Catalog, MAX_ERROR_MESSAGE_CHARS};
pub use client::{DbClient, DbConfig};
pub use error::{DbError, DbResult};
pub use query::Query;
pub use retry::RetryConfig;
pub use types::FrameMatch;
