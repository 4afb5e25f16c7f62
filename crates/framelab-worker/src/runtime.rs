//! Job runtime.
//!
//! A [`Job`] only describes its business logic. [`run_attempt`] wraps one
//! execution with the soft and hard time limits, runs the failure hook and
//! asks the job's [`RetryPolicy`] what happens next. Scheduling the retry is
//! the caller's concern.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::Instrument;

use framelab_models::JobId;
use framelab_queue::{RetryDecision, RetryPolicy};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync {
    type Output: Send;

    /// Stable job type name for logs and metrics.
    fn name(&self) -> &'static str;

    fn job_id(&self) -> &JobId;

    fn retry_policy(&self) -> RetryPolicy;

    /// Run one attempt. `attempt` is 1-based.
    async fn execute(&self, ctx: &WorkerContext, attempt: u32) -> WorkerResult<Self::Output>;

    /// Called after every failed attempt, including hard timeouts.
    async fn on_failure(&self, _ctx: &WorkerContext, _error: &WorkerError) {}
}

/// Per-attempt time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Logs a warning once exceeded
    pub soft: Duration,
    /// Aborts the attempt once exceeded
    pub hard: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            soft: Duration::from_secs(3300),
            hard: Duration::from_secs(3600),
        }
    }
}

/// Result of one attempt after the retry policy was consulted.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Succeeded(T),
    /// Failed with budget left; run again after the delay
    Retry { after: Duration, error: WorkerError },
    /// Failed for good
    Failed(WorkerError),
}

impl<T> AttemptOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded(_))
    }
}

/// Execute one attempt of `job` under `timeouts` and its retry policy.
pub async fn run_attempt<J: Job>(
    job: &J,
    ctx: &WorkerContext,
    attempt: u32,
    timeouts: Timeouts,
) -> AttemptOutcome<J::Output> {
    let logger = JobLogger::new(job.job_id(), job.name(), attempt);
    let span = logger.span();

    async {
        let budget = job.retry_policy().max_attempts;
        if attempt > budget {
            let error =
                WorkerError::job_failed(format!("retry budget of {} attempts exhausted", budget));
            logger.log_error(&error.to_string());
            job.on_failure(ctx, &error).await;
            metrics::record_job_failed(job.name());
            return AttemptOutcome::Failed(error);
        }

        logger.log_start(&format!("attempt {}", attempt));
        metrics::record_job_started(job.name());
        let started = Instant::now();

        let result = execute_with_limits(job, ctx, attempt, timeouts, &logger).await;

        let error = match result {
            Ok(output) => {
                metrics::record_job_completed(job.name(), started.elapsed().as_secs_f64());
                logger.log_completion(&format!("in {:.1}s", started.elapsed().as_secs_f64()));
                return AttemptOutcome::Succeeded(output);
            }
            Err(e) => e,
        };

        logger.log_error(&error.to_string());
        job.on_failure(ctx, &error).await;

        match job.retry_policy().decide(attempt, error.is_retryable()) {
            RetryDecision::RetryAfter(after) => {
                metrics::record_job_retried(job.name());
                logger.log_warning(&format!("will retry in {}s", after.as_secs()));
                AttemptOutcome::Retry { after, error }
            }
            RetryDecision::GiveUp => {
                metrics::record_job_failed(job.name());
                AttemptOutcome::Failed(error)
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute_with_limits<J: Job>(
    job: &J,
    ctx: &WorkerContext,
    attempt: u32,
    timeouts: Timeouts,
    logger: &JobLogger,
) -> WorkerResult<J::Output> {
    let exec = job.execute(ctx, attempt);
    tokio::pin!(exec);

    let soft = tokio::time::sleep(timeouts.soft);
    tokio::pin!(soft);
    let hard = tokio::time::sleep(timeouts.hard);
    tokio::pin!(hard);
    let mut soft_fired = false;

    loop {
        tokio::select! {
            result = &mut exec => return result,
            _ = &mut soft, if !soft_fired => {
                soft_fired = true;
                metrics::record_soft_timeout(job.name());
                logger.log_warning(&format!(
                    "soft time limit of {}s exceeded",
                    timeouts.soft.as_secs()
                ));
            }
            _ = &mut hard => return Err(WorkerError::Timeout(timeouts.hard.as_secs())),
        }
    }
}
