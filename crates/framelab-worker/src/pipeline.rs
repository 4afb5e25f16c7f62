//! Orchestration of the pipeline jobs.
//!
//! Maps a queued envelope to its job, runs one attempt and chains the
//! embedding job after a successful frame extraction.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use framelab_queue::{ExtractEmbeddingsJob, JobEnvelope, JobSink, QueueJob, RetryDecision};

use crate::context::WorkerContext;
use crate::jobs::{
    extraction_retry_policy, AutoAnnotation, EmbeddingExtraction, ExtractionCompleted,
    FrameExtraction,
};
use crate::runtime::{run_attempt, AttemptOutcome, Timeouts};

/// What the executor should do with the queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Acknowledge
    Completed,
    /// Re-enqueue the next attempt after `delay`
    RetryAfter { delay: Duration, error: String },
    /// Dead-letter
    Failed(String),
}

fn settle<T>(outcome: AttemptOutcome<T>) -> Dispatch {
    match outcome {
        AttemptOutcome::Succeeded(_) => Dispatch::Completed,
        AttemptOutcome::Retry { after, error } => Dispatch::RetryAfter {
            delay: after,
            error: error.to_string(),
        },
        AttemptOutcome::Failed(error) => Dispatch::Failed(error.to_string()),
    }
}

pub struct Pipeline {
    ctx: Arc<WorkerContext>,
    sink: Arc<dyn JobSink>,
    timeouts: Timeouts,
}

impl Pipeline {
    pub fn new(ctx: Arc<WorkerContext>, sink: Arc<dyn JobSink>, timeouts: Timeouts) -> Self {
        Self {
            ctx,
            sink,
            timeouts,
        }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Run one attempt of the enveloped job.
    pub async fn dispatch(&self, envelope: &JobEnvelope) -> Dispatch {
        let attempt = envelope.attempt.max(1);

        match &envelope.job {
            QueueJob::ExtractFrames(job) => {
                let job = FrameExtraction::new(job.clone());
                match run_attempt(&job, &self.ctx, attempt, self.timeouts).await {
                    AttemptOutcome::Succeeded(done) => self.chain_embeddings(done, attempt).await,
                    other => settle(other),
                }
            }
            QueueJob::ExtractEmbeddings(job) => {
                let job = EmbeddingExtraction::new(job.clone());
                settle(run_attempt(&job, &self.ctx, attempt, self.timeouts).await)
            }
            QueueJob::AutoAnnotate(job) => {
                let job = AutoAnnotation::new(job.clone());
                settle(run_attempt(&job, &self.ctx, attempt, self.timeouts).await)
            }
        }
    }

    /// Enqueue embeddings for a finished video.
    ///
    /// If the enqueue fails the extraction message is retried. The video is
    /// already `ready` by then, so the next attempt only re-emits the
    /// completion and tries the enqueue again.
    async fn chain_embeddings(&self, done: ExtractionCompleted, attempt: u32) -> Dispatch {
        let next = QueueJob::from(ExtractEmbeddingsJob::new(done.video_id.clone()));

        match self.sink.enqueue(next).await {
            Ok(message_id) => {
                info!(
                    video_id = %done.video_id,
                    frame_count = done.frame_count,
                    message_id = %message_id,
                    "Enqueued embedding extraction"
                );
                Dispatch::Completed
            }
            Err(e) if e.is_duplicate() => {
                info!(video_id = %done.video_id, "Embedding extraction already queued");
                Dispatch::Completed
            }
            Err(e) => {
                warn!(video_id = %done.video_id, "Failed to enqueue embedding extraction: {}", e);
                let error = format!("enqueue embedding extraction: {}", e);
                match extraction_retry_policy().decide(attempt, true) {
                    RetryDecision::RetryAfter(delay) => Dispatch::RetryAfter { delay, error },
                    RetryDecision::GiveUp => Dispatch::Failed(error),
                }
            }
        }
    }
}
