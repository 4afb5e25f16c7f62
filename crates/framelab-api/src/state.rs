//! Application state.

use std::sync::Arc;

use anyhow::Context;

use framelab_db::{Catalog, DbClient};
use framelab_ml_client::{Embedder, MlClient};
use framelab_queue::{JobQueue, JobSink};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub catalog: Arc<dyn Catalog>,
    pub jobs: Arc<dyn JobSink>,
    pub embedder: Arc<dyn Embedder>,
    /// Present in production for readiness checks
    pub queue: Option<Arc<JobQueue>>,
}

impl AppState {
    /// Create application state from environment variables.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let catalog = DbClient::from_env().context("relational store config")?;
        let embedder = MlClient::from_env().context("inference service config")?;
        let queue = Arc::new(JobQueue::from_env().context("queue config")?);
        queue.init().await.context("queue init")?;

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            jobs: queue.clone(),
            embedder: Arc::new(embedder),
            queue: Some(queue),
        })
    }

    /// State over arbitrary collaborators.
    pub fn with_parts(
        config: ApiConfig,
        catalog: Arc<dyn Catalog>,
        jobs: Arc<dyn JobSink>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            catalog,
            jobs,
            embedder,
            queue: None,
        }
    }
}
