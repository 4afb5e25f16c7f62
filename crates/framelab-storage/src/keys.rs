//! Object key layout.
//!
//! ```text
//! projects/{project}/videos/{video}/frames/{n:06}.jpg
//! projects/{project}/videos/{video}/thumbnails/{n:06}.jpg
//! ```

use framelab_models::{ProjectId, VideoId};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

fn video_prefix(project_id: &ProjectId, video_id: &VideoId) -> String {
    format!("projects/{}/videos/{}", project_id, video_id)
}

/// Key of a full-size frame image.
pub fn frame_key(project_id: &ProjectId, video_id: &VideoId, frame_number: u32) -> String {
    format!(
        "{}/frames/{:06}.jpg",
        video_prefix(project_id, video_id),
        frame_number
    )
}

/// Key of a frame thumbnail.
pub fn thumbnail_key(project_id: &ProjectId, video_id: &VideoId, frame_number: u32) -> String {
    format!(
        "{}/thumbnails/{:06}.jpg",
        video_prefix(project_id, video_id),
        frame_number
    )
}
