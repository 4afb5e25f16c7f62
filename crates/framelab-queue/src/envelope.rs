//! Attempt bookkeeping carried alongside a job payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::QueueJob;

/// What is actually stored in the stream.
///
/// A retried job is re-added as a new stream entry, so the attempt count
/// travels with the payload rather than with a message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: QueueJob,
    /// 1-based attempt number of the next execution
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl JobEnvelope {
    /// First attempt of a new submission.
    pub fn new(job: QueueJob) -> Self {
        Self {
            job,
            attempt: 1,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Envelope for the following attempt after `error`.
    pub fn next_attempt(&self, error: impl Into<String>) -> Self {
        Self {
            job: self.job.clone(),
            attempt: self.attempt + 1,
            enqueued_at: Utc::now(),
            last_error: Some(error.into()),
        }
    }

    /// Envelope for an entry reclaimed from a consumer that stopped
    /// responding. Each of the `lost` earlier deliveries spent an attempt.
    pub fn reclaimed(&self, lost: u32) -> Self {
        if lost == 0 {
            return self.clone();
        }
        let last_lost = self.attempt.saturating_add(lost - 1);
        Self {
            job: self.job.clone(),
            attempt: self.attempt.saturating_add(lost),
            enqueued_at: self.enqueued_at,
            last_error: Some(format!("worker lost during attempt {}", last_lost)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ExtractEmbeddingsJob;
    use framelab_models::VideoId;

    #[test]
    fn test_next_attempt_keeps_job() {
        let first = JobEnvelope::new(ExtractEmbeddingsJob::new(VideoId::from("v1")).into());
        let second = first.next_attempt("embedding service returned 500");

        assert_eq!(first.attempt, 1);
        assert_eq!(second.attempt, 2);
        assert_eq!(second.job, first.job);
        assert_eq!(second.last_error.as_deref(), Some("embedding service returned 500"));
    }

    #[test]
    fn test_reclaimed_counts_lost_deliveries() {
        let first = JobEnvelope::new(ExtractEmbeddingsJob::new(VideoId::from("v1")).into());

        let once = first.reclaimed(1);
        assert_eq!(once.attempt, 2);
        assert_eq!(once.last_error.as_deref(), Some("worker lost during attempt 1"));

        let thrice = first.next_attempt("timeout").reclaimed(3);
        assert_eq!(thrice.attempt, 5);
        assert_eq!(thrice.last_error.as_deref(), Some("worker lost during attempt 4"));
        assert_eq!(thrice.job, first.job);

        assert_eq!(first.reclaimed(0), first);
    }
}
