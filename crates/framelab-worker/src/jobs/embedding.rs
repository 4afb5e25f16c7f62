//! Embedding extraction job.

use async_trait::async_trait;

use framelab_ml_client::MlError;
use framelab_models::{Frame, JobId, VideoId};
use framelab_queue::{ExtractEmbeddingsJob, RetryPolicy};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::runtime::Job;

/// Counts reported by one embedding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingSummary {
    pub frames_total: usize,
    /// Embedding calls made
    pub batches: usize,
    pub embeddings_stored: usize,
    /// Frames whose image could not be downloaded
    pub frames_skipped: usize,
}

/// Embeds every frame of a video in fixed-size batches.
///
/// A frame whose image cannot be fetched is left out of its batch. A failed
/// embedding call fails the whole run.
pub struct EmbeddingExtraction {
    job: ExtractEmbeddingsJob,
}

impl EmbeddingExtraction {
    pub fn new(job: ExtractEmbeddingsJob) -> Self {
        Self { job }
    }

    fn video_id(&self) -> &VideoId {
        &self.job.video_id
    }

    async fn load_frames(&self, ctx: &WorkerContext) -> WorkerResult<Vec<Frame>> {
        let page_size = ctx.pipeline.frame_page_size.max(1);
        let mut frames = Vec::new();
        let mut offset = 0;

        loop {
            let page = ctx
                .catalog
                .list_frames_page(self.video_id(), offset, page_size)
                .await?;
            let fetched = page.len();
            frames.extend(page);
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        Ok(frames)
    }

    async fn embed_batch(
        &self,
        ctx: &WorkerContext,
        batch: &[Frame],
        summary: &mut EmbeddingSummary,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let mut images = Vec::with_capacity(batch.len());
        let mut kept = Vec::with_capacity(batch.len());

        for frame in batch {
            match ctx.storage.get(&frame.storage_key).await {
                Ok(bytes) => {
                    images.push(bytes);
                    kept.push(frame);
                }
                Err(e) => {
                    summary.frames_skipped += 1;
                    logger.log_warning(&format!(
                        "skipping frame {} ({}): {}",
                        frame.frame_number, frame.id, e
                    ));
                }
            }
        }

        if images.is_empty() {
            return Ok(());
        }

        let vectors = ctx.embedder.embed_images(&images).await?;
        summary.batches += 1;
        if vectors.len() != kept.len() {
            return Err(MlError::invalid_response(format!(
                "expected {} embeddings, got {}",
                kept.len(),
                vectors.len()
            ))
            .into());
        }

        for (frame, vector) in kept.into_iter().zip(vectors) {
            ctx.catalog.set_frame_embedding(&frame.id, &vector).await?;
            summary.embeddings_stored += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl Job for EmbeddingExtraction {
    type Output = EmbeddingSummary;

    fn name(&self) -> &'static str {
        "extract_embeddings"
    }

    fn job_id(&self) -> &JobId {
        &self.job.job_id
    }

    fn retry_policy(&self) -> RetryPolicy {
        super::inference_retry_policy()
    }

    async fn execute(&self, ctx: &WorkerContext, attempt: u32) -> WorkerResult<EmbeddingSummary> {
        let logger = JobLogger::new(&self.job.job_id, self.name(), attempt);

        if ctx.catalog.get_video(self.video_id()).await?.is_none() {
            return Err(WorkerError::not_found(format!("videos/{}", self.video_id())));
        }

        let frames = self.load_frames(ctx).await?;
        let batch_size = ctx.pipeline.embedding_batch_size.max(1);
        let mut summary = EmbeddingSummary {
            frames_total: frames.len(),
            ..Default::default()
        };

        logger.log_progress(&format!(
            "embedding {} frames in batches of {}",
            frames.len(),
            batch_size
        ));

        for batch in frames.chunks(batch_size) {
            self.embed_batch(ctx, batch, &mut summary, &logger).await?;
        }

        metrics::record_embeddings_stored(summary.embeddings_stored);
        if summary.frames_skipped > 0 {
            metrics::record_frames_skipped(self.name(), summary.frames_skipped);
        }

        logger.log_progress(&format!(
            "stored {}/{} embeddings, {} skipped",
            summary.embeddings_stored, summary.frames_total, summary.frames_skipped
        ));

        Ok(summary)
    }
}
