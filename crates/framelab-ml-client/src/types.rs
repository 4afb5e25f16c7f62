//! Wire types for the inference service.

use framelab_models::PixelBox;
use serde::{Deserialize, Serialize};

/// One detector candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: PixelBox,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SegmentRequest<'a> {
    /// Base64-encoded image bytes
    pub image: String,
    pub prompt: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SegmentResponse {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDetection {
    /// `[x1, y1, x2, y2]` in pixels
    pub bbox: [f64; 4],
    pub score: f64,
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        let [x1, y1, x2, y2] = raw.bbox;
        Self {
            bbox: PixelBox::from_corners(x1, y1, x2, y2),
            confidence: raw.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedImagesRequest {
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedImagesResponse {
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedTextRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedTextResponse {
    pub embedding: Vec<f32>,
}

