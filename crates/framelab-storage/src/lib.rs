//! S3-compatible object storage client.
//!
//! This crate provides:
//! - The [`ObjectStore`] seam (`put`, `get`, `delete`) used by the pipeline
//! - An `aws-sdk-s3` backed implementation for R2/MinIO/S3
//! - The object key layout for source videos, frames and thumbnails

pub mod client;
pub mod error;
pub mod keys;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{Operation, StorageError, StorageResult};
pub use store::ObjectStore;
