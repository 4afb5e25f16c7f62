//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::annotations::{auto_annotate, delete_frame_annotations};
use crate::handlers::search::search_frames;
use crate::handlers::videos::upload_complete;
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes =
        Router::new().route("/videos/:video_id/upload-complete", post(upload_complete));

    let annotation_routes = Router::new()
        .route("/projects/:project_id/auto-annotate", post(auto_annotate))
        .route("/frames/:frame_id/annotations", delete(delete_frame_annotations));

    let search_routes = Router::new().route("/projects/:project_id/search", post(search_frames));

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(annotation_routes)
        .merge(search_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
