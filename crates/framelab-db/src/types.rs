//! Row shapes that only exist at the store boundary.

use serde::{Deserialize, Serialize};

use framelab_models::{FrameId, VideoId};

/// Column list for frame reads. Embeddings are large and never read back.
pub const FRAME_COLUMNS: &str =
    "id,video_id,frame_number,timestamp_ms,storage_key,thumbnail_key,width,height";

/// Column list for annotation box reads.
pub const ANNOTATION_COLUMNS: &str =
    "id,frame_id,label_id,x,y,width,height,confidence,source,reviewed";

/// One row returned by the `match_frames` similarity RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMatch {
    pub frame_id: FrameId,
    pub video_id: VideoId,
    pub frame_number: u32,
    pub timestamp_ms: u64,
    pub thumbnail_key: String,
    /// Cosine similarity, higher is closer
    pub similarity: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MatchFramesArgs<'a> {
    pub project_id: &'a str,
    pub query_embedding: &'a [f32],
    pub match_count: usize,
}

