//! Annotation records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{AnnotationId, FrameId, LabelId};
use crate::rect::NormalizedBox;

/// How an annotation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    /// Drawn by a user
    #[default]
    Manual,
    /// Produced by the detector
    Auto,
    /// Loaded from an imported dataset
    Imported,
}

impl AnnotationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationSource::Manual => "manual",
            AnnotationSource::Auto => "auto",
            AnnotationSource::Imported => "imported",
        }
    }
}

impl fmt::Display for AnnotationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Annotation row. The box columns are stored flat (`x`, `y`, `width`, `height`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Annotation {
    pub id: AnnotationId,
    pub frame_id: FrameId,
    pub label_id: LabelId,
    #[serde(flatten)]
    pub bbox: NormalizedBox,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: AnnotationSource,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Annotation awaiting insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewAnnotation {
    pub frame_id: FrameId,
    pub label_id: LabelId,
    #[serde(flatten)]
    pub bbox: NormalizedBox,
    pub confidence: Option<f64>,
    pub source: AnnotationSource,
    pub reviewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl NewAnnotation {
    /// Pending, unreviewed detector output.
    pub fn auto(
        frame_id: FrameId,
        label_id: LabelId,
        bbox: NormalizedBox,
        confidence: f64,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            frame_id,
            label_id,
            bbox,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            source: AnnotationSource::Auto,
            reviewed: false,
            created_by: Some(created_by.into()),
        }
    }
}
