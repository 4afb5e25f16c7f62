//! Axum HTTP API server.
//!
//! Thin trigger surface over the media pipeline:
//! - Upload completion (starts frame extraction)
//! - Auto-annotation requests
//! - Bulk deletion of a frame's annotations
//! - Semantic frame search
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
