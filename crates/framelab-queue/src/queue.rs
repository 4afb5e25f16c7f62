//! Job queue using Redis Streams.
//!
//! Layout:
//! - `stream_name`: live jobs, read through a consumer group
//! - `delayed_set_name`: retries waiting for their due time (score = due ms)
//! - `dlq_stream_name`: jobs that exhausted their retry budget

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::envelope::JobEnvelope;
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Move one member of the delayed set into the stream.
///
/// Returns nil when another promoter already took it. XADD runs before ZREM,
/// so a failed XADD leaves the member in place.
const PROMOTE_SCRIPT: &str = r#"
if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then
    return false
end
local id = redis.call('XADD', KEYS[2], '*', 'job', ARGV[1], 'key', ARGV[2])
redis.call('ZREM', KEYS[1], ARGV[1])
return id
"#;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Sorted set holding delayed retries
    pub delayed_set_name: String,
    /// How long an idempotency key blocks re-submission
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "framelab:jobs".to_string(),
            consumer_group: "framelab:workers".to_string(),
            dlq_stream_name: "framelab:dlq".to_string(),
            delayed_set_name: "framelab:delayed".to_string(),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            delayed_set_name: std::env::var("QUEUE_DELAYED_SET")
                .unwrap_or(defaults.delayed_set_name),
            dedup_ttl: defaults.dedup_ttl,
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::unavailable(e.to_string()))
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Check the connection.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Enqueue a new job as attempt 1.
    ///
    /// Rejected with [`QueueError::Duplicate`] while the job's idempotency key
    /// is still live.
    pub async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        let mut conn = self.conn().await?;

        let idempotency_key = job.idempotency_key();
        let dedup_key = format!("framelab:dedup:{}", idempotency_key);

        // SET NX claims the key atomically, so concurrent submitters can't both pass
        let claimed: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs())
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();

        if !claimed {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let envelope = JobEnvelope::new(job);
        let message_id = match self.xadd(&mut conn, &envelope).await {
            Ok(id) => id,
            Err(e) => {
                // Release the key so the caller can resubmit
                let _: Result<(), _> = conn.del(&dedup_key).await;
                return Err(e);
            }
        };

        info!(
            "Enqueued {} job {} with message ID {}",
            envelope.job.kind(),
            envelope.job.job_id(),
            message_id
        );

        Ok(message_id)
    }

    async fn xadd(
        &self,
        conn: &mut MultiplexedConnection,
        envelope: &JobEnvelope,
    ) -> QueueResult<String> {
        let payload = serde_json::to_string(envelope)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(envelope.job.idempotency_key())
            .query_async(conn)
            .await?;

        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(
        &self,
        message_id: &str,
        envelope: &JobEnvelope,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(envelope)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(
            "Moved job {} to DLQ after {} attempt(s): {}",
            envelope.job.job_id(),
            envelope.attempt,
            error
        );
        Ok(())
    }

    /// Park the next attempt in the delayed set and ack the current message.
    pub async fn schedule_retry(
        &self,
        message_id: &str,
        next: &JobEnvelope,
        due_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(next)?;
        conn.zadd::<_, _, _, ()>(
            &self.config.delayed_set_name,
            &payload,
            due_at.timestamp_millis(),
        )
        .await?;

        self.ack(message_id).await?;

        info!(
            "Scheduled attempt {} of job {} at {}",
            next.attempt,
            next.job.job_id(),
            due_at
        );
        Ok(())
    }

    /// Move delayed retries whose due time has passed back into the stream.
    ///
    /// Each move is one script call, so a payload is always in the set or
    /// the stream and concurrent promoters never double-add.
    pub async fn promote_due(&self, now: DateTime<Utc>, limit: usize) -> QueueResult<usize> {
        let mut conn = self.conn().await?;

        let due: Vec<String> = conn
            .zrangebyscore_limit(
                &self.config.delayed_set_name,
                "-inf",
                now.timestamp_millis(),
                0,
                limit as isize,
            )
            .await?;

        let script = redis::Script::new(PROMOTE_SCRIPT);
        let mut promoted = 0;
        for payload in due {
            let envelope = match serde_json::from_str::<JobEnvelope>(&payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("Dropping malformed delayed job: {}", e);
                    conn.zrem::<_, _, ()>(&self.config.delayed_set_name, &payload)
                        .await?;
                    continue;
                }
            };

            let message_id: Option<String> = script
                .key(&self.config.delayed_set_name)
                .key(&self.config.stream_name)
                .arg(&payload)
                .arg(envelope.job.idempotency_key())
                .invoke_async(&mut conn)
                .await?;
            if message_id.is_some() {
                promoted += 1;
            }
        }

        if promoted > 0 {
            debug!("Promoted {} delayed job(s)", promoted);
        }
        Ok(promoted)
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    /// Number of retries waiting for their due time.
    pub async fn delayed_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.zcard(&self.config.delayed_set_name).await?)
    }

    /// Read new jobs for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobEnvelope)>> {
        let mut conn = self.conn().await?;

        let result: StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(envelope) = self.decode_entry(&entry).await {
                    debug!("Consumed job {} from stream", envelope.job.job_id());
                    jobs.push((entry.id, envelope));
                }
            }
        }

        Ok(jobs)
    }

    /// Claim pending jobs that have been idle for too long.
    /// This handles jobs from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, JobEnvelope)>> {
        let mut conn = self.conn().await?;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let deliveries: HashMap<String, usize> = pending
            .ids
            .into_iter()
            .filter(|p| p.last_delivered_ms as u64 >= min_idle_ms)
            .map(|p| (p.id, p.times_delivered))
            .collect();
        let stale: Vec<String> = deliveries.keys().cloned().collect();

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        // XCLAIM re-checks idle time, so an entry another worker just claimed is skipped
        let result: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg(&stale)
            .query_async(&mut conn)
            .await?;

        // Every earlier delivery of a stale entry ended without an ack
        let mut jobs = Vec::new();
        for entry in result.ids {
            if let Some(envelope) = self.decode_entry(&entry).await {
                let lost = deliveries.get(&entry.id).copied().unwrap_or(1);
                let envelope = envelope.reclaimed(u32::try_from(lost).unwrap_or(u32::MAX));
                info!(
                    "Claimed pending job {} from stream as attempt {}",
                    envelope.job.job_id(),
                    envelope.attempt
                );
                jobs.push((entry.id, envelope));
            }
        }

        Ok(jobs)
    }

    /// Decode a stream entry, acking it if the payload is unusable.
    async fn decode_entry(&self, entry: &StreamId) -> Option<JobEnvelope> {
        let Some(redis::Value::BulkString(payload)) = entry.map.get("job") else {
            warn!("Stream entry {} has no job payload", entry.id);
            self.ack(&entry.id).await.ok();
            return None;
        };

        let payload_str = String::from_utf8_lossy(payload);
        match serde_json::from_str::<JobEnvelope>(&payload_str) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("Failed to parse job payload: {}", e);
                // Ack the malformed message to prevent reprocessing
                self.ack(&entry.id).await.ok();
                None
            }
        }
    }
}
