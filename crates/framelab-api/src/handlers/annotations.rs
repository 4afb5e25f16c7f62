//! Annotation handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use framelab_models::{FrameId, LabelId, ProjectId};
use framelab_queue::{AutoAnnotateJob, QueueJob};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Validate)]
pub struct AutoAnnotateRequest {
    pub label_id: LabelId,
    #[validate(length(min = 1, max = 1000))]
    pub frame_ids: Vec<FrameId>,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub iou_threshold: f64,
    /// Acting user, recorded as `created_by`
    #[validate(length(min = 1))]
    pub requested_by: String,
}

#[derive(Debug, Serialize)]
pub struct AutoAnnotateResponse {
    pub job_id: String,
    pub frame_count: usize,
}

/// Validate an auto-annotation request and queue it.
pub async fn auto_annotate(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<AutoAnnotateRequest>,
) -> ApiResult<(StatusCode, Json<AutoAnnotateResponse>)> {
    request.validate()?;
    if request.frame_ids.len() > state.config.max_auto_annotate_frames {
        return Err(ApiError::validation(format!(
            "frame_ids: at most {} frames per request",
            state.config.max_auto_annotate_frames
        )));
    }

    let project_id = ProjectId::from(project_id);
    let label = state
        .catalog
        .get_label(&request.label_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("labels/{}", request.label_id)))?;
    if label.project_id != project_id {
        return Err(ApiError::bad_request(format!(
            "label {} does not belong to project {}",
            label.id, project_id
        )));
    }

    let frame_count = request.frame_ids.len();
    let job = AutoAnnotateJob::new(
        project_id,
        label.id,
        request.frame_ids,
        request.requested_by,
    )
    .with_thresholds(request.confidence_threshold, request.iou_threshold);
    let job_id = job.job_id.to_string();

    state.jobs.enqueue(QueueJob::from(job)).await?;
    metrics::record_job_enqueued("auto_annotate");
    info!(job_id = %job_id, frame_count, "Queued auto-annotation");

    Ok((
        StatusCode::ACCEPTED,
        Json(AutoAnnotateResponse { job_id, frame_count }),
    ))
}

#[derive(Debug, Serialize)]
pub struct DeleteAnnotationsResponse {
    pub frame_id: FrameId,
    pub deleted: usize,
}

/// Delete every annotation on a frame.
pub async fn delete_frame_annotations(
    State(state): State<AppState>,
    Path(frame_id): Path<String>,
) -> ApiResult<Json<DeleteAnnotationsResponse>> {
    let frame_id = FrameId::from(frame_id);
    let deleted = state.catalog.delete_frame_annotations(&frame_id).await?;

    info!(frame_id = %frame_id, deleted, "Deleted frame annotations");
    Ok(Json(DeleteAnnotationsResponse { frame_id, deleted }))
}
