//! Video lifecycle handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use framelab_models::{VideoId, VideoStatus};
use framelab_queue::{ExtractFramesJob, QueueJob};

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadCompleteResponse {
    pub video_id: VideoId,
    pub status: VideoStatus,
    /// Absent when an extraction for this video was already queued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Mark an upload finished and queue frame extraction.
///
/// Only the first call for a video wins; later calls get 409. If the job
/// cannot be queued the video is moved to `failed` with the queue error.
pub async fn upload_complete(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<(StatusCode, Json<UploadCompleteResponse>)> {
    let video_id = VideoId::from(video_id);
    let video = state.catalog.begin_processing(&video_id).await?;

    let job = ExtractFramesJob::new(video_id.clone());
    let job_id = job.job_id.to_string();

    let job_id = match state.jobs.enqueue(QueueJob::from(job)).await {
        Ok(_) => {
            metrics::record_job_enqueued("extract_frames");
            info!(video_id = %video_id, job_id = %job_id, "Queued frame extraction");
            Some(job_id)
        }
        Err(e) if e.is_duplicate() => {
            warn!(video_id = %video_id, "Frame extraction already queued");
            None
        }
        Err(e) => {
            let message = format!("enqueue frame extraction: {}", e);
            if let Err(update_error) = state.catalog.mark_failed(&video_id, &message).await {
                error!(
                    video_id = %video_id,
                    error = %e,
                    update_error = %update_error,
                    "Failed to mark video as failed"
                );
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadCompleteResponse {
            video_id,
            status: video.status,
            job_id,
        }),
    ))
}
