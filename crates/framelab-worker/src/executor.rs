//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use framelab_queue::{JobEnvelope, JobQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{Dispatch, Pipeline};

/// Pulls envelopes off the stream and runs them through the [`Pipeline`].
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: Arc<JobQueue>, pipeline: Arc<Pipeline>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue,
            pipeline,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`JobExecutor::shutdown`] is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let claim_task = self.spawn_claim_task();
        let promote_task = self.spawn_promote_task();

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        promote_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "Shutdown timeout of {}s reached with jobs still running; they will be redelivered",
                self.config.shutdown_timeout.as_secs()
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Reclaim entries left pending by crashed workers.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let claimed = match queue.claim_pending(&consumer_name, min_idle_ms, 5).await {
                    Ok(claimed) => claimed,
                    Err(e) => {
                        warn!("Failed to claim pending jobs: {}", e);
                        continue;
                    }
                };
                if claimed.is_empty() {
                    continue;
                }

                info!("Claimed {} pending jobs", claimed.len());
                for (message_id, envelope) in claimed {
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        return;
                    };
                    let queue = Arc::clone(&queue);
                    let pipeline = Arc::clone(&pipeline);
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::execute_job(pipeline, queue, message_id, envelope).await;
                    });
                }
            }
        })
    }

    /// Move due retries from the delayed set back into the stream.
    fn spawn_promote_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let interval = self.config.promote_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = queue.promote_due(Utc::now(), 50).await {
                    warn!("Failed to promote delayed jobs: {}", e);
                    continue;
                }
                if let (Ok(stream), Ok(delayed), Ok(dead)) =
                    (queue.len().await, queue.delayed_len().await, queue.dlq_len().await)
                {
                    metrics::record_queue_depth(stream, delayed, dead);
                }
            }
        })
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, envelope) in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let pipeline = Arc::clone(&self.pipeline);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, queue, message_id, envelope).await;
            });
        }

        Ok(())
    }

    async fn execute_job(
        pipeline: Arc<Pipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        envelope: JobEnvelope,
    ) {
        let job_id = envelope.job.job_id().clone();
        let kind = envelope.job.kind();
        debug!("Executing {} job {} (attempt {})", kind, job_id, envelope.attempt);

        match pipeline.dispatch(&envelope).await {
            Dispatch::Completed => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job_id, e);
                }
            }
            Dispatch::RetryAfter { delay, error } => {
                let due_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                let next = envelope.next_attempt(error);
                if let Err(e) = queue.schedule_retry(&message_id, &next, due_at).await {
                    // Left pending, so the claim task redelivers it
                    error!("Failed to schedule retry of job {}: {}", job_id, e);
                }
            }
            Dispatch::Failed(error) => {
                if let Err(e) = queue.dlq(&message_id, &envelope, &error).await {
                    error!("Failed to move job {} to DLQ: {}", job_id, e);
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        let capacity = self.config.max_concurrent_jobs.max(1);
        while self.job_semaphore.available_permits() < capacity {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
