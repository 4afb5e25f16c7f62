//! Worker metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "framelab_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "framelab_jobs_completed_total";
    pub const JOBS_RETRIED_TOTAL: &str = "framelab_jobs_retried_total";
    pub const JOBS_FAILED_TOTAL: &str = "framelab_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "framelab_job_duration_seconds";
    pub const JOB_SOFT_TIMEOUTS_TOTAL: &str = "framelab_job_soft_timeouts_total";

    pub const FRAMES_EXTRACTED_TOTAL: &str = "framelab_frames_extracted_total";
    pub const EMBEDDINGS_STORED_TOTAL: &str = "framelab_embeddings_stored_total";
    pub const FRAMES_SKIPPED_TOTAL: &str = "framelab_frames_skipped_total";
    pub const ANNOTATIONS_CREATED_TOTAL: &str = "framelab_annotations_created_total";
    pub const DUPLICATES_SKIPPED_TOTAL: &str = "framelab_duplicates_skipped_total";

    /// Entries by location: stream, delayed, dead_letter
    pub const QUEUE_DEPTH: &str = "framelab_queue_depth";
}

pub fn record_queue_depth(stream: u64, delayed: u64, dead_letter: u64) {
    gauge!(names::QUEUE_DEPTH, "location" => "stream").set(stream as f64);
    gauge!(names::QUEUE_DEPTH, "location" => "delayed").set(delayed as f64);
    gauge!(names::QUEUE_DEPTH, "location" => "dead_letter").set(dead_letter as f64);
}

pub fn record_job_started(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(job_type: &str, duration_secs: f64) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_retried(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_RETRIED_TOTAL, &labels).increment(1);
}

pub fn record_job_failed(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_soft_timeout(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOB_SOFT_TIMEOUTS_TOTAL, &labels).increment(1);
}

pub fn record_frames_extracted(count: usize) {
    counter!(names::FRAMES_EXTRACTED_TOTAL).increment(count as u64);
}

pub fn record_embeddings_stored(count: usize) {
    counter!(names::EMBEDDINGS_STORED_TOTAL).increment(count as u64);
}

/// Frames left out of a stage after a per-frame failure.
pub fn record_frames_skipped(stage: &str, count: usize) {
    let labels = [("stage", stage.to_string())];
    counter!(names::FRAMES_SKIPPED_TOTAL, &labels).increment(count as u64);
}

pub fn record_auto_annotation(created: usize, duplicates: usize) {
    counter!(names::ANNOTATIONS_CREATED_TOTAL).increment(created as u64);
    counter!(names::DUPLICATES_SKIPPED_TOTAL).increment(duplicates as u64);
}
