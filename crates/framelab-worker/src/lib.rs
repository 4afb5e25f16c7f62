//! Media processing worker.
//!
//! This crate provides:
//! - The job runtime: [`Job`] trait, retry policy and soft/hard timeouts
//! - Frame extraction, embedding extraction and auto-annotation jobs
//! - Pipeline orchestration (extraction completion enqueues embeddings)
//! - The Redis-backed executor with crash recovery and graceful shutdown

pub mod config;
pub mod context;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod scratch;

pub use config::{PipelineConfig, WorkerConfig};
pub use context::WorkerContext;
pub use error::{ErrorKind, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{Dispatch, Pipeline};
pub use runtime::{run_attempt, AttemptOutcome, Job, Timeouts};
