//! Semantic frame search.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use framelab_db::FrameMatch;
use framelab_models::ProjectId;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 512))]
    pub query: String,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1))]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<FrameMatch>,
}

/// Embed a free-text query and return the nearest frames in a project.
pub async fn search_frames(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    request.validate()?;
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::validation("query: must not be blank"));
    }
    let limit = request.limit.min(state.config.max_search_results);
    let project_id = ProjectId::from(project_id);

    let embedding = match state.embedder.embed_text(&query).await {
        Ok(embedding) => embedding,
        Err(e) => {
            if e.is_timeout() {
                metrics::record_search_timeout();
                warn!(project_id = %project_id, "Text embedding timed out");
            }
            return Err(e.into());
        }
    };

    let results = state
        .catalog
        .match_frames(&project_id, &embedding, limit)
        .await?;

    info!(project_id = %project_id, results = results.len(), "Search completed");
    Ok(Json(SearchResponse { query, results }))
}
