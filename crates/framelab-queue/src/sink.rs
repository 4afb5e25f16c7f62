//! Enqueue seam.

use async_trait::async_trait;

use crate::error::QueueResult;
use crate::job::QueueJob;
use crate::queue::JobQueue;

/// Anything jobs can be submitted to.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Submit a job, returning its stream message id.
    async fn enqueue(&self, job: QueueJob) -> QueueResult<String>;
}

#[async_trait]
impl JobSink for JobQueue {
    async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        JobQueue::enqueue(self, job).await
    }
}
