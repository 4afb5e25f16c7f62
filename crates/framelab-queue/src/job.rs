//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use framelab_models::{FrameId, JobId, LabelId, ProjectId, VideoId};

fn default_threshold() -> f64 {
    0.5
}

/// Sample a video into frames and thumbnails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractFramesJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl ExtractFramesJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("extract_frames:{}", self.video_id)
    }
}

/// Compute and store embeddings for every frame of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractEmbeddingsJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl ExtractEmbeddingsJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("extract_embeddings:{}", self.video_id)
    }
}

/// Run the detector over a set of frames for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAnnotateJob {
    pub job_id: JobId,
    pub project_id: ProjectId,
    pub label_id: LabelId,
    pub frame_ids: Vec<FrameId>,
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_threshold")]
    pub iou_threshold: f64,
    /// User the created annotations are attributed to
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
}

impl AutoAnnotateJob {
    pub fn new(
        project_id: ProjectId,
        label_id: LabelId,
        frame_ids: Vec<FrameId>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            project_id,
            label_id,
            frame_ids,
            confidence_threshold: default_threshold(),
            iou_threshold: default_threshold(),
            requested_by: requested_by.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_thresholds(mut self, confidence: f64, iou: f64) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    /// Every request is its own submission; duplicates are absorbed by IoU dedup.
    pub fn idempotency_key(&self) -> String {
        format!("auto_annotate:{}:{}", self.label_id, self.job_id)
    }
}

/// Job type discriminator, used for metrics labels and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ExtractFrames,
    ExtractEmbeddings,
    AutoAnnotate,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ExtractFrames => "extract_frames",
            JobKind::ExtractEmbeddings => "extract_embeddings",
            JobKind::AutoAnnotate => "auto_annotate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    ExtractFrames(ExtractFramesJob),
    ExtractEmbeddings(ExtractEmbeddingsJob),
    AutoAnnotate(AutoAnnotateJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ExtractFrames(j) => &j.job_id,
            QueueJob::ExtractEmbeddings(j) => &j.job_id,
            QueueJob::AutoAnnotate(j) => &j.job_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            QueueJob::ExtractFrames(_) => JobKind::ExtractFrames,
            QueueJob::ExtractEmbeddings(_) => JobKind::ExtractEmbeddings,
            QueueJob::AutoAnnotate(_) => JobKind::AutoAnnotate,
        }
    }

    /// Returns the video_id if applicable.
    pub fn video_id(&self) -> Option<&VideoId> {
        match self {
            QueueJob::ExtractFrames(j) => Some(&j.video_id),
            QueueJob::ExtractEmbeddings(j) => Some(&j.video_id),
            QueueJob::AutoAnnotate(_) => None,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ExtractFrames(j) => j.idempotency_key(),
            QueueJob::ExtractEmbeddings(j) => j.idempotency_key(),
            QueueJob::AutoAnnotate(j) => j.idempotency_key(),
        }
    }
}

impl From<ExtractFramesJob> for QueueJob {
    fn from(job: ExtractFramesJob) -> Self {
        QueueJob::ExtractFrames(job)
    }
}

impl From<ExtractEmbeddingsJob> for QueueJob {
    fn from(job: ExtractEmbeddingsJob) -> Self {
        QueueJob::ExtractEmbeddings(job)
    }
}

impl From<AutoAnnotateJob> for QueueJob {
    fn from(job: AutoAnnotateJob) -> Self {
        QueueJob::AutoAnnotate(job)
    }
}
