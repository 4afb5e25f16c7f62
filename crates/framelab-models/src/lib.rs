//! Shared data models for the FrameLab media pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Videos and the video status state machine
//! - Frames and frame descriptors produced by extraction
//! - Labels and annotations (manual, auto, imported)
//! - Normalized bounding-box geometry (clamping, IoU)

pub mod annotation;
pub mod frame;
pub mod ids;
pub mod label;
pub mod rect;
pub mod video;

// Re-export common types
pub use annotation::{Annotation, AnnotationSource, NewAnnotation};
pub use frame::{Frame, FrameDescriptor};
pub use ids::{AnnotationId, FrameId, JobId, LabelId, ProjectId, VideoId};
pub use label::Label;
pub use rect::{NormalizedBox, PixelBox};
pub use video::{TransitionError, Video, VideoEvent, VideoMetadata, VideoStatus};
