//! Frame records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{FrameId, VideoId};

/// Frame row.
///
/// Created in bulk by frame extraction. Only `embedding` changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Frame {
    pub id: FrameId,
    pub video_id: VideoId,
    /// 0-based, gapless within a video
    pub frame_number: u32,
    pub timestamp_ms: u64,
    pub storage_key: String,
    pub thumbnail_key: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Frame produced by extraction, before it is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDescriptor {
    pub video_id: VideoId,
    pub frame_number: u32,
    pub timestamp_ms: u64,
    pub storage_key: String,
    pub thumbnail_key: String,
    pub width: u32,
    pub height: u32,
}
