//! Catalog repositories for videos, frames, labels and annotations.
//!
//! Status changes are conditional updates (`status=eq.<expected>`), so two
//! concurrent callers racing on the same video resolve first-wins at the
//! store. The loser re-reads the row to report why it lost.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use framelab_models::{
    Annotation, Frame, FrameDescriptor, FrameId, Label, LabelId, NewAnnotation, ProjectId, Video,
    VideoEvent, VideoId, VideoMetadata, VideoStatus,
};

use crate::client::DbClient;
use crate::error::{DbError, DbResult};
use crate::query::Query;
use crate::types::{FrameMatch, MatchFramesArgs, ANNOTATION_COLUMNS, FRAME_COLUMNS};

const VIDEOS: &str = "videos";
const FRAMES: &str = "frames";
const LABELS: &str = "labels";
const ANNOTATIONS: &str = "annotations";

/// Longest error message stored on a video row.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Cut `message` to at most [`MAX_ERROR_MESSAGE_CHARS`] characters.
pub fn truncate_error_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Store operations used by the pipeline and the trigger API.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_video(&self, video_id: &VideoId) -> DbResult<Option<Video>>;

    /// `uploading -> processing`. First caller wins; later callers get
    /// [`TransitionError::NotUploading`](framelab_models::TransitionError::NotUploading).
    async fn begin_processing(&self, video_id: &VideoId) -> DbResult<Video>;

    /// Re-enter `processing` at the start of a retried extraction attempt.
    async fn resume_processing(&self, video_id: &VideoId) -> DbResult<Video>;

    /// `processing -> ready` with measured metadata and frame count.
    async fn complete_extraction(
        &self,
        video_id: &VideoId,
        metadata: &VideoMetadata,
    ) -> DbResult<Video>;

    /// `processing -> failed` with a truncated error message.
    async fn mark_failed(&self, video_id: &VideoId, error_message: &str) -> DbResult<Video>;

    /// Register frames in one call, merging on `(video_id, frame_number)`.
    async fn upsert_frames(&self, frames: &[FrameDescriptor]) -> DbResult<usize>;

    /// One page of a video's frames ordered by frame number.
    async fn list_frames_page(
        &self,
        video_id: &VideoId,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<Frame>>;

    /// Frames by id. Unknown ids are absent from the result.
    async fn get_frames(&self, frame_ids: &[FrameId]) -> DbResult<Vec<Frame>>;

    async fn set_frame_embedding(&self, frame_id: &FrameId, embedding: &[f32]) -> DbResult<()>;

    async fn get_label(&self, label_id: &LabelId) -> DbResult<Option<Label>>;

    /// Annotations of one label across a set of frames.
    async fn list_annotations(
        &self,
        label_id: &LabelId,
        frame_ids: &[FrameId],
    ) -> DbResult<Vec<Annotation>>;

    /// Insert annotations in one call.
    async fn insert_annotations(&self, annotations: &[NewAnnotation]) -> DbResult<usize>;

    /// Delete every annotation on a frame, returning how many were removed.
    async fn delete_frame_annotations(&self, frame_id: &FrameId) -> DbResult<usize>;

    /// Nearest frames to `embedding` within a project.
    async fn match_frames(
        &self,
        project_id: &ProjectId,
        embedding: &[f32],
        limit: usize,
    ) -> DbResult<Vec<FrameMatch>>;
}

impl DbClient {
    /// Apply `event` only if the row is still in the event's source status.
    async fn apply_event(
        &self,
        video_id: &VideoId,
        event: VideoEvent,
        mut patch: serde_json::Value,
    ) -> DbResult<Video> {
        patch["status"] = json!(event.target());
        patch["updated_at"] = json!(Utc::now());

        let query = Query::new()
            .eq("id", video_id)
            .eq("status", event.source().as_str());
        let rows: Vec<Video> = self.update(VIDEOS, &query, &patch).await?;

        if let Some(video) = rows.into_iter().next() {
            debug!(video_id = %video_id, status = %video.status, "Video transitioned");
            return Ok(video);
        }

        let current = self.current_status(video_id).await?;
        match event.apply(current) {
            Err(e) => Err(e.into()),
            // Row moved back into the source status after our update missed it
            Ok(_) => Err(DbError::Conflict(format!(
                "videos/{} changed concurrently",
                video_id
            ))),
        }
    }

    async fn current_status(&self, video_id: &VideoId) -> DbResult<VideoStatus> {
        self.get_video(video_id)
            .await?
            .map(|v| v.status)
            .ok_or_else(|| DbError::not_found(format!("videos/{}", video_id)))
    }
}

#[async_trait]
impl Catalog for DbClient {
    async fn get_video(&self, video_id: &VideoId) -> DbResult<Option<Video>> {
        let rows: Vec<Video> = self
            .select(VIDEOS, &Query::new().eq("id", video_id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn begin_processing(&self, video_id: &VideoId) -> DbResult<Video> {
        self.apply_event(
            video_id,
            VideoEvent::UploadCompleted,
            json!({ "error_message": null }),
        )
        .await
    }

    async fn resume_processing(&self, video_id: &VideoId) -> DbResult<Video> {
        let query = Query::new().eq("id", video_id).in_list(
            "status",
            [VideoStatus::Failed.as_str(), VideoStatus::Processing.as_str()],
        );
        let patch = json!({
            "status": VideoStatus::Processing,
            "error_message": null,
            "updated_at": Utc::now(),
        });
        let rows: Vec<Video> = self.update(VIDEOS, &query, &patch).await?;

        match rows.into_iter().next() {
            Some(video) => Ok(video),
            None => {
                let current = self.current_status(video_id).await?;
                current.resume_for_retry()?;
                Err(DbError::Conflict(format!(
                    "videos/{} changed concurrently",
                    video_id
                )))
            }
        }
    }

    async fn complete_extraction(
        &self,
        video_id: &VideoId,
        metadata: &VideoMetadata,
    ) -> DbResult<Video> {
        self.apply_event(
            video_id,
            VideoEvent::ExtractionSucceeded,
            json!({
                "width": metadata.width,
                "height": metadata.height,
                "fps": metadata.fps,
                "duration": metadata.duration,
                "frame_count": metadata.frame_count,
                "error_message": null,
            }),
        )
        .await
    }

    async fn mark_failed(&self, video_id: &VideoId, error_message: &str) -> DbResult<Video> {
        self.apply_event(
            video_id,
            VideoEvent::ExtractionFailed,
            json!({ "error_message": truncate_error_message(error_message) }),
        )
        .await
    }

    async fn upsert_frames(&self, frames: &[FrameDescriptor]) -> DbResult<usize> {
        if frames.is_empty() {
            return Ok(0);
        }
        self.insert(FRAMES, frames, Some("video_id,frame_number"))
            .await?;
        Ok(frames.len())
    }

    async fn list_frames_page(
        &self,
        video_id: &VideoId,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<Frame>> {
        let query = Query::new()
            .select(FRAME_COLUMNS)
            .eq("video_id", video_id)
            .order("frame_number", true)
            .offset(offset)
            .limit(limit);
        self.select(FRAMES, &query).await
    }

    async fn get_frames(&self, frame_ids: &[FrameId]) -> DbResult<Vec<Frame>> {
        if frame_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new()
            .select(FRAME_COLUMNS)
            .in_list("id", frame_ids.iter().map(|id| id.as_str()));
        self.select(FRAMES, &query).await
    }

    async fn set_frame_embedding(&self, frame_id: &FrameId, embedding: &[f32]) -> DbResult<()> {
        let query = Query::new().select("id").eq("id", frame_id);
        let rows: Vec<serde_json::Value> = self
            .update(FRAMES, &query, &json!({ "embedding": embedding }))
            .await?;

        if rows.is_empty() {
            return Err(DbError::not_found(format!("frames/{}", frame_id)));
        }
        Ok(())
    }

    async fn get_label(&self, label_id: &LabelId) -> DbResult<Option<Label>> {
        let rows: Vec<Label> = self
            .select(LABELS, &Query::new().eq("id", label_id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_annotations(
        &self,
        label_id: &LabelId,
        frame_ids: &[FrameId],
    ) -> DbResult<Vec<Annotation>> {
        if frame_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new()
            .select(ANNOTATION_COLUMNS)
            .eq("label_id", label_id)
            .in_list("frame_id", frame_ids.iter().map(|id| id.as_str()));
        self.select(ANNOTATIONS, &query).await
    }

    async fn insert_annotations(&self, annotations: &[NewAnnotation]) -> DbResult<usize> {
        if annotations.is_empty() {
            return Ok(0);
        }
        self.insert(ANNOTATIONS, annotations, None).await?;
        Ok(annotations.len())
    }

    async fn delete_frame_annotations(&self, frame_id: &FrameId) -> DbResult<usize> {
        let query = Query::new().select("id").eq("frame_id", frame_id);
        self.delete(ANNOTATIONS, &query).await
    }

    async fn match_frames(
        &self,
        project_id: &ProjectId,
        embedding: &[f32],
        limit: usize,
    ) -> DbResult<Vec<FrameMatch>> {
        let args = MatchFramesArgs {
            project_id: project_id.as_str(),
            query_embedding: embedding,
            match_count: limit,
        };
        self.rpc("match_frames", &args).await
    }
}
