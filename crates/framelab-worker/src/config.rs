//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use framelab_media::{ThumbnailSpec, DEFAULT_FRAME_INTERVAL_SECS};

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Past this, a running job logs a warning
    pub soft_timeout: Duration,
    /// Past this, a running job is aborted and counts as a failed attempt
    pub hard_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// How often delayed retries are checked for promotion
    pub promote_interval: Duration,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            soft_timeout: Duration::from_secs(3300),
            hard_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/framelab"),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(3900),
            promote_interval: Duration::from_secs(1),
            metrics_enabled: false,
            metrics_port: 9100,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", d.max_concurrent_jobs),
            soft_timeout: Duration::from_secs(env_parse("WORKER_SOFT_TIMEOUT", 3300)),
            hard_timeout: Duration::from_secs(env_parse("WORKER_HARD_TIMEOUT", 3600)),
            shutdown_timeout: Duration::from_secs(env_parse("WORKER_SHUTDOWN_TIMEOUT", 30)),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.work_dir),
            claim_interval: Duration::from_secs(env_parse("WORKER_CLAIM_INTERVAL_SECS", 30)),
            // Must stay above the hard timeout or live jobs get stolen
            claim_min_idle: Duration::from_secs(env_parse("WORKER_CLAIM_MIN_IDLE_SECS", 3900)),
            promote_interval: Duration::from_millis(env_parse("WORKER_PROMOTE_INTERVAL_MS", 1000)),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            metrics_port: env_parse("WORKER_METRICS_PORT", d.metrics_port),
        }
    }
}

/// Tunables of the three pipeline jobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seconds between sampled frames
    pub frame_interval_secs: f64,
    pub thumbnail: ThumbnailSpec,
    /// Frames per embedding call
    pub embedding_batch_size: usize,
    /// Ids per lookup query
    pub lookup_batch_size: usize,
    /// Rows per frame listing page
    pub frame_page_size: usize,
    /// Upper bound on frames per auto-annotation request
    pub max_auto_annotate_frames: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: DEFAULT_FRAME_INTERVAL_SECS,
            thumbnail: ThumbnailSpec::default(),
            embedding_batch_size: 8,
            lookup_batch_size: 50,
            frame_page_size: 1000,
            max_auto_annotate_frames: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            frame_interval_secs: env_parse("FRAME_INTERVAL_SECS", d.frame_interval_secs),
            thumbnail: d.thumbnail,
            embedding_batch_size: env_parse("EMBEDDING_BATCH_SIZE", d.embedding_batch_size).max(1),
            lookup_batch_size: env_parse("LOOKUP_BATCH_SIZE", d.lookup_batch_size).max(1),
            frame_page_size: env_parse("FRAME_PAGE_SIZE", d.frame_page_size).max(1),
            max_auto_annotate_frames: env_parse(
                "MAX_AUTO_ANNOTATE_FRAMES",
                d.max_auto_annotate_frames,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.soft_timeout, Duration::from_secs(3300));
        assert_eq!(worker.hard_timeout, Duration::from_secs(3600));
        assert!(worker.claim_min_idle > worker.hard_timeout);

        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.frame_interval_secs, 1.0);
        assert_eq!(pipeline.embedding_batch_size, 8);
        assert_eq!(pipeline.lookup_batch_size, 50);
        assert_eq!(pipeline.thumbnail.width, 320);
        assert_eq!(pipeline.thumbnail.height, 180);
    }
}
