//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job payloads and the envelope that carries attempt counts
//! - Enqueueing with idempotency-key deduplication
//! - Consumer-group consumption, crash recovery and a dead-letter stream
//! - Delayed retries through a sorted set promoted back into the stream
//! - Retry policies (max attempts, backoff schedule)

pub mod envelope;
pub mod error;
pub mod job;
pub mod queue;
pub mod retry;
pub mod sink;

pub use envelope::JobEnvelope;
pub use error::{QueueError, QueueResult};
pub use job::{AutoAnnotateJob, ExtractEmbeddingsJob, ExtractFramesJob, JobKind, QueueJob};
pub use queue::{JobQueue, QueueConfig};
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use sink::JobSink;
