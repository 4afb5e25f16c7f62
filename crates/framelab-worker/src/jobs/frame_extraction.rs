//! Frame extraction job.
//!
//! Samples the uploaded source at a fixed interval, uploads every frame with
//! its thumbnail, registers the frames in one bulk call and moves the video to
//! `ready`. Any failure marks the video `failed` through the failure hook.

use async_trait::async_trait;
use tracing::{error, info};

use framelab_media::{image_dimensions, make_thumbnail, sample_schedule, MediaError, VideoInfo};
use framelab_models::{FrameDescriptor, JobId, Video, VideoId, VideoMetadata, VideoStatus};
use framelab_queue::{ExtractFramesJob, RetryPolicy};
use framelab_storage::keys::{frame_key, thumbnail_key, JPEG_CONTENT_TYPE};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::runtime::Job;
use crate::scratch::ScratchDir;

/// Emitted when a video has all of its frames registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCompleted {
    pub video_id: VideoId,
    pub frame_count: u32,
    /// The video was already `ready` when this attempt started (redelivery)
    pub already_ready: bool,
}

pub struct FrameExtraction {
    job: ExtractFramesJob,
}

impl FrameExtraction {
    pub fn new(job: ExtractFramesJob) -> Self {
        Self { job }
    }

    fn video_id(&self) -> &VideoId {
        &self.job.video_id
    }

    /// Bring the video into `processing` for this attempt, or short-circuit
    /// if a previous delivery already finished it.
    async fn enter_processing(
        &self,
        ctx: &WorkerContext,
        video: &Video,
        logger: &JobLogger,
    ) -> WorkerResult<Option<ExtractionCompleted>> {
        match video.status {
            VideoStatus::Processing => Ok(None),
            VideoStatus::Failed => {
                logger.log_progress("resuming failed video");
                ctx.catalog.resume_processing(self.video_id()).await?;
                Ok(None)
            }
            VideoStatus::Ready => Ok(Some(ExtractionCompleted {
                video_id: video.id.clone(),
                frame_count: video.frame_count.unwrap_or(0),
                already_ready: true,
            })),
            VideoStatus::Uploading => Err(WorkerError::validation(format!(
                "videos/{} has not finished uploading",
                video.id
            ))),
        }
    }

    async fn extract(
        &self,
        ctx: &WorkerContext,
        video: &Video,
        scratch: &ScratchDir,
        logger: &JobLogger,
    ) -> WorkerResult<(VideoInfo, Vec<FrameDescriptor>)> {
        let source = scratch.join("source");
        ctx.storage.get_to_file(&video.storage_key, &source).await?;

        let info = ctx.decoder.probe(&source).await?;
        let schedule = sample_schedule(info.duration, ctx.pipeline.frame_interval_secs)?;
        if schedule.is_empty() {
            return Err(MediaError::invalid_video(format!(
                "nothing to sample in {:.3}s of video",
                info.duration
            ))
            .into());
        }

        logger.log_progress(&format!(
            "sampling {} frames from {:.1}s at {}x{}",
            schedule.len(),
            info.duration,
            info.width,
            info.height
        ));

        let spec = ctx.pipeline.thumbnail;
        let mut frames = Vec::with_capacity(schedule.len());

        for point in &schedule {
            let path = scratch.join(format!("{:06}.jpg", point.frame_number));
            ctx.decoder
                .extract_frame(&source, point.seconds, &path)
                .await?;

            let bytes = tokio::fs::read(&path).await?;
            let (width, height) = image_dimensions(&bytes)?;

            let (bytes, thumbnail) = tokio::task::spawn_blocking(move || {
                let thumbnail = make_thumbnail(&bytes, &spec);
                (bytes, thumbnail)
            })
            .await
            .map_err(|e| WorkerError::job_failed(format!("thumbnail task failed: {}", e)))?;
            let thumbnail = thumbnail?;

            let storage_key = frame_key(&video.project_id, &video.id, point.frame_number);
            let thumb_key = thumbnail_key(&video.project_id, &video.id, point.frame_number);
            ctx.storage.put(&storage_key, bytes, JPEG_CONTENT_TYPE).await?;
            ctx.storage.put(&thumb_key, thumbnail, JPEG_CONTENT_TYPE).await?;

            // Uploaded, the local copy is no longer needed
            if let Err(e) = tokio::fs::remove_file(&path).await {
                logger.log_warning(&format!("failed to remove {}: {}", path.display(), e));
            }

            frames.push(FrameDescriptor {
                video_id: video.id.clone(),
                frame_number: point.frame_number,
                timestamp_ms: point.timestamp_ms,
                storage_key,
                thumbnail_key: thumb_key,
                width,
                height,
            });

            if frames.len() % 100 == 0 {
                logger.log_progress(&format!("{}/{} frames uploaded", frames.len(), schedule.len()));
            }
        }

        Ok((info, frames))
    }
}

#[async_trait]
impl Job for FrameExtraction {
    type Output = ExtractionCompleted;

    fn name(&self) -> &'static str {
        "extract_frames"
    }

    fn job_id(&self) -> &JobId {
        &self.job.job_id
    }

    fn retry_policy(&self) -> RetryPolicy {
        super::extraction_retry_policy()
    }

    async fn execute(&self, ctx: &WorkerContext, attempt: u32) -> WorkerResult<ExtractionCompleted> {
        let logger = JobLogger::new(&self.job.job_id, self.name(), attempt);

        let video = ctx
            .catalog
            .get_video(self.video_id())
            .await?
            .ok_or_else(|| WorkerError::not_found(format!("videos/{}", self.video_id())))?;

        if let Some(done) = self.enter_processing(ctx, &video, &logger).await? {
            logger.log_progress("video already ready, re-emitting completion");
            return Ok(done);
        }

        let scratch =
            ScratchDir::create(&ctx.work_dir, &format!("extract-{}-", self.job.job_id)).await?;
        let extracted = self.extract(ctx, &video, &scratch, &logger).await;
        scratch.release(&logger);
        let (info, frames) = extracted?;

        let registered = ctx.catalog.upsert_frames(&frames).await?;
        metrics::record_frames_extracted(frames.len());

        let frame_count = frames.len() as u32;
        let metadata = VideoMetadata {
            width: info.width,
            height: info.height,
            fps: info.fps,
            duration: info.duration,
            frame_count,
        };
        ctx.catalog
            .complete_extraction(self.video_id(), &metadata)
            .await?;

        info!(
            video_id = %self.video_id(),
            frame_count,
            registered,
            "Video ready"
        );

        Ok(ExtractionCompleted {
            video_id: self.job.video_id.clone(),
            frame_count,
            already_ready: false,
        })
    }

    async fn on_failure(&self, ctx: &WorkerContext, failure: &WorkerError) {
        if let Err(update_error) = ctx
            .catalog
            .mark_failed(self.video_id(), &failure.to_string())
            .await
        {
            error!(
                video_id = %self.video_id(),
                error = %failure,
                update_error = %update_error,
                "Failed to mark video as failed"
            );
        }
    }
}
