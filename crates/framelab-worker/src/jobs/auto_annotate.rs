//! Auto-annotation job.
//!
//! Runs the detector over a set of frames with the label name as prompt,
//! keeps candidates that are confident enough and do not overlap a box the
//! frame already has, and inserts the survivors as pending `auto`
//! annotations in a single call.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use framelab_media::image_dimensions;
use framelab_models::{Frame, FrameId, JobId, Label, NewAnnotation, NormalizedBox};
use framelab_queue::{AutoAnnotateJob, RetryPolicy};

use crate::context::WorkerContext;
use crate::dedup::{select_detections, Selection, SelectionParams};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::runtime::Job;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoAnnotationSummary {
    /// Frames that went through detection successfully
    pub frames_processed: usize,
    pub annotations_created: usize,
    pub duplicates_skipped: usize,
    pub frames_failed: usize,
}

pub struct AutoAnnotation {
    job: AutoAnnotateJob,
}

impl AutoAnnotation {
    pub fn new(job: AutoAnnotateJob) -> Self {
        Self { job }
    }

    fn params(&self) -> SelectionParams {
        SelectionParams {
            confidence_threshold: self.job.confidence_threshold,
            iou_threshold: self.job.iou_threshold,
        }
    }

    fn validate(&self, max_frames: usize) -> WorkerResult<()> {
        if self.job.frame_ids.len() > max_frames {
            return Err(WorkerError::validation(format!(
                "{} frames requested, at most {} allowed",
                self.job.frame_ids.len(),
                max_frames
            )));
        }
        for (name, value) in [
            ("confidence_threshold", self.job.confidence_threshold),
            ("iou_threshold", self.job.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WorkerError::validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    async fn load_label(&self, ctx: &WorkerContext) -> WorkerResult<Label> {
        let label = ctx
            .catalog
            .get_label(&self.job.label_id)
            .await?
            .ok_or_else(|| WorkerError::not_found(format!("labels/{}", self.job.label_id)))?;

        if label.project_id != self.job.project_id {
            return Err(WorkerError::validation(format!(
                "label {} does not belong to project {}",
                label.id, self.job.project_id
            )));
        }
        Ok(label)
    }

    /// Requested frames in request order, without repeats or unknown ids.
    async fn load_frames(&self, ctx: &WorkerContext, requested: &[FrameId]) -> WorkerResult<Vec<Frame>> {
        let mut found: HashMap<FrameId, Frame> = HashMap::with_capacity(requested.len());
        for chunk in requested.chunks(ctx.pipeline.lookup_batch_size.max(1)) {
            for frame in ctx.catalog.get_frames(chunk).await? {
                found.insert(frame.id.clone(), frame);
            }
        }

        Ok(requested.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn existing_boxes(
        &self,
        ctx: &WorkerContext,
        frame_ids: &[FrameId],
    ) -> WorkerResult<HashMap<FrameId, Vec<NormalizedBox>>> {
        let mut boxes: HashMap<FrameId, Vec<NormalizedBox>> = HashMap::new();
        for chunk in frame_ids.chunks(ctx.pipeline.lookup_batch_size.max(1)) {
            for annotation in ctx.catalog.list_annotations(&self.job.label_id, chunk).await? {
                boxes
                    .entry(annotation.frame_id)
                    .or_default()
                    .push(annotation.bbox);
            }
        }
        Ok(boxes)
    }

    async fn annotate_frame(
        &self,
        ctx: &WorkerContext,
        label: &Label,
        frame: &Frame,
        existing: &[NormalizedBox],
    ) -> WorkerResult<Selection> {
        let image = ctx.storage.get(&frame.storage_key).await?;

        let (width, height) = match (frame.width, frame.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => image_dimensions(&image)?,
        };

        let detections = ctx.detector.segment(&image, &label.name).await?;
        Ok(select_detections(existing, &detections, width, height, self.params()))
    }
}

#[async_trait]
impl Job for AutoAnnotation {
    type Output = AutoAnnotationSummary;

    fn name(&self) -> &'static str {
        "auto_annotate"
    }

    fn job_id(&self) -> &JobId {
        &self.job.job_id
    }

    fn retry_policy(&self) -> RetryPolicy {
        super::inference_retry_policy()
    }

    async fn execute(&self, ctx: &WorkerContext, attempt: u32) -> WorkerResult<AutoAnnotationSummary> {
        let logger = JobLogger::new(&self.job.job_id, self.name(), attempt);

        self.validate(ctx.pipeline.max_auto_annotate_frames)?;
        let label = self.load_label(ctx).await?;

        let mut seen = HashSet::new();
        let requested: Vec<FrameId> = self
            .job
            .frame_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        let frames = self.load_frames(ctx, &requested).await?;
        if frames.len() < requested.len() {
            logger.log_warning(&format!(
                "{} of {} frames not found",
                requested.len() - frames.len(),
                requested.len()
            ));
        }

        let frame_ids: Vec<FrameId> = frames.iter().map(|f| f.id.clone()).collect();
        let existing = self.existing_boxes(ctx, &frame_ids).await?;

        let mut summary = AutoAnnotationSummary::default();
        let mut pending: Vec<NewAnnotation> = Vec::new();

        for frame in &frames {
            let boxes = existing.get(&frame.id).map(Vec::as_slice).unwrap_or(&[]);
            match self.annotate_frame(ctx, &label, frame, boxes).await {
                Ok(selection) => {
                    summary.frames_processed += 1;
                    summary.duplicates_skipped += selection.duplicates_skipped;
                    pending.extend(selection.accepted.into_iter().map(|c| {
                        NewAnnotation::auto(
                            frame.id.clone(),
                            label.id.clone(),
                            c.bbox,
                            c.confidence,
                            &self.job.requested_by,
                        )
                    }));
                }
                Err(e) => {
                    summary.frames_failed += 1;
                    logger.log_warning(&format!("frame {} failed: {}", frame.id, e));
                }
            }
        }

        if !pending.is_empty() {
            summary.annotations_created = ctx.catalog.insert_annotations(&pending).await?;
        }

        metrics::record_auto_annotation(summary.annotations_created, summary.duplicates_skipped);
        if summary.frames_failed > 0 {
            metrics::record_frames_skipped(self.name(), summary.frames_failed);
        }

        logger.log_progress(&format!(
            "label '{}': {} frames, {} created, {} duplicates, {} failed",
            label.name,
            summary.frames_processed,
            summary.annotations_created,
            summary.duplicates_skipped,
            summary.frames_failed
        ));

        Ok(summary)
    }
}
