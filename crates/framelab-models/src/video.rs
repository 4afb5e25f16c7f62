//! Video records and the video status state machine.
//!
//! The lifecycle of a video is:
//!
//! ```text
//! uploading ──upload complete──▶ processing ──extraction ok────▶ ready
//!                                     │
//!                                     └──────extraction failed──▶ failed
//! ```
//!
//! Those three edges are the only transitions [`VideoStatus::transition_to`]
//! accepts. A retried extraction attempt re-enters `processing` through
//! [`VideoStatus::resume_for_retry`], which is reserved for the job runtime.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ids::{ProjectId, VideoId};

/// Video processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Source file is still being uploaded by the client
    #[default]
    Uploading,
    /// Frames are being extracted
    Processing,
    /// Frames are registered and visible
    Ready,
    /// The last extraction attempt failed
    Failed,
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("video is not in uploading state (current: {current})")]
    NotUploading { current: VideoStatus },

    #[error("video is not in processing state (current: {current})")]
    NotProcessing { current: VideoStatus },

    #[error("illegal video transition {from} -> {to}")]
    Illegal { from: VideoStatus, to: VideoStatus },
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploading => "uploading",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }

    /// Whether `self -> next` is one of the legal edges.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Uploading, VideoStatus::Processing)
                | (VideoStatus::Processing, VideoStatus::Ready)
                | (VideoStatus::Processing, VideoStatus::Failed)
        )
    }

    /// Validate a transition and return the new status.
    pub fn transition_to(self, next: VideoStatus) -> Result<VideoStatus, TransitionError> {
        if self.can_transition_to(next) {
            return Ok(next);
        }

        Err(match next {
            VideoStatus::Processing => TransitionError::NotUploading { current: self },
            VideoStatus::Ready | VideoStatus::Failed if self != VideoStatus::Processing => {
                TransitionError::NotProcessing { current: self }
            }
            _ => TransitionError::Illegal { from: self, to: next },
        })
    }

    /// Re-enter `processing` at the start of a retried extraction attempt.
    ///
    /// A previous attempt leaves the video `failed` (or still `processing`
    /// when the worker died mid-attempt). `uploading` and `ready` cannot be
    /// resumed.
    pub fn resume_for_retry(self) -> Result<VideoStatus, TransitionError> {
        match self {
            VideoStatus::Failed | VideoStatus::Processing => Ok(VideoStatus::Processing),
            other => Err(TransitionError::Illegal {
                from: other,
                to: VideoStatus::Processing,
            }),
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named triggers of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEvent {
    /// Client finished uploading the source file
    UploadCompleted,
    /// Frame extraction registered every frame
    ExtractionSucceeded,
    /// Frame extraction gave up on this attempt
    ExtractionFailed,
}

impl VideoEvent {
    /// Status the video must currently be in.
    pub fn source(&self) -> VideoStatus {
        match self {
            VideoEvent::UploadCompleted => VideoStatus::Uploading,
            VideoEvent::ExtractionSucceeded | VideoEvent::ExtractionFailed => {
                VideoStatus::Processing
            }
        }
    }

    /// Status the event moves the video into.
    pub fn target(&self) -> VideoStatus {
        match self {
            VideoEvent::UploadCompleted => VideoStatus::Processing,
            VideoEvent::ExtractionSucceeded => VideoStatus::Ready,
            VideoEvent::ExtractionFailed => VideoStatus::Failed,
        }
    }

    /// Apply the event to a current status.
    pub fn apply(&self, current: VideoStatus) -> Result<VideoStatus, TransitionError> {
        current.transition_to(self.target())
    }
}

/// Video row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: VideoId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub status: VideoStatus,
    /// Object-storage key of the uploaded source file
    pub storage_key: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Measured properties written on successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
    pub frame_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [VideoStatus; 4] = [
        VideoStatus::Uploading,
        VideoStatus::Processing,
        VideoStatus::Ready,
        VideoStatus::Failed,
    ];

    #[test]
    fn test_only_three_transitions_are_legal() {
        let legal = [
            (VideoStatus::Uploading, VideoStatus::Processing),
            (VideoStatus::Processing, VideoStatus::Ready),
            (VideoStatus::Processing, VideoStatus::Failed),
        ];

        for from in ALL {
            for to in ALL {
                let result = from.transition_to(to);
                if legal.contains(&(from, to)) {
                    assert_eq!(result, Ok(to), "{from} -> {to} should succeed");
                } else {
                    assert!(result.is_err(), "{from} -> {to} should be rejected");
                }
            }
        }
    }

    #[test]
    fn test_duplicate_upload_complete_is_rejected() {
        let status = VideoEvent::UploadCompleted
            .apply(VideoStatus::Uploading)
            .unwrap();
        let err = VideoEvent::UploadCompleted.apply(status).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotUploading {
                current: VideoStatus::Processing
            }
        );
        assert!(err.to_string().contains("not in uploading state"));
    }

    #[test]
    fn test_events_match_their_edges() {
        for event in [
            VideoEvent::UploadCompleted,
            VideoEvent::ExtractionSucceeded,
            VideoEvent::ExtractionFailed,
        ] {
            assert!(event.source().can_transition_to(event.target()));
        }
    }

    #[test]
    fn test_resume_for_retry() {
        assert_eq!(
            VideoStatus::Failed.resume_for_retry(),
            Ok(VideoStatus::Processing)
        );
        assert_eq!(
            VideoStatus::Processing.resume_for_retry(),
            Ok(VideoStatus::Processing)
        );
        assert!(VideoStatus::Uploading.resume_for_retry().is_err());
        assert!(VideoStatus::Ready.resume_for_retry().is_err());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&VideoStatus::Processing).unwrap(),
            "\"processing\""
        );
        let status: VideoStatus = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(status, VideoStatus::Ready);
    }
}
