//! Shared handles passed to every job.

use std::path::PathBuf;
use std::sync::Arc;

use framelab_db::{Catalog, DbClient};
use framelab_media::{FfmpegDecoder, VideoDecoder};
use framelab_ml_client::{Detector, Embedder, MlClient};
use framelab_storage::{ObjectStore, S3Client};

use crate::config::{PipelineConfig, WorkerConfig};
use crate::error::WorkerResult;

/// Everything a job handler may touch.
///
/// Built once at worker startup and shared by reference, so the inference
/// client and connection pools are never re-created per job.
#[derive(Clone)]
pub struct WorkerContext {
    pub storage: Arc<dyn ObjectStore>,
    pub catalog: Arc<dyn Catalog>,
    pub detector: Arc<dyn Detector>,
    pub embedder: Arc<dyn Embedder>,
    pub decoder: Arc<dyn VideoDecoder>,
    pub pipeline: PipelineConfig,
    /// Parent of per-job scratch directories
    pub work_dir: PathBuf,
}

impl WorkerContext {
    /// Production context from environment variables.
    pub fn from_env(worker: &WorkerConfig) -> WorkerResult<Self> {
        let ml = Arc::new(MlClient::from_env()?);

        Ok(Self {
            storage: Arc::new(S3Client::from_env()?),
            catalog: Arc::new(DbClient::from_env()?),
            detector: ml.clone(),
            embedder: ml,
            decoder: Arc::new(FfmpegDecoder::default()),
            pipeline: PipelineConfig::from_env(),
            work_dir: worker.work_dir.clone(),
        })
    }
}
