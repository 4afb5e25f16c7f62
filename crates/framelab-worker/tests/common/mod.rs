//! In-memory collaborators for driving jobs without S3, the REST store,
//! Redis, FFmpeg or the inference service.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageOutputFormat, RgbImage};

use framelab_db::{Catalog, DbError, DbResult, FrameMatch};
use framelab_media::{MediaError, MediaResult, Tool, VideoDecoder, VideoInfo};
use framelab_ml_client::{Detection, Detector, Embedder, MlError, MlResult};
use framelab_models::{
    Annotation, AnnotationId, Frame, FrameDescriptor, FrameId, Label, LabelId, NewAnnotation,
    NormalizedBox, ProjectId, Video, VideoEvent, VideoId, VideoMetadata, VideoStatus,
};
use framelab_queue::{JobSink, QueueError, QueueJob, QueueResult};
use framelab_storage::{ObjectStore, Operation, StorageError, StorageResult};
use framelab_worker::{PipelineConfig, WorkerContext};

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([30, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Jpeg(85))
        .unwrap();
    out.into_inner()
}

// ---------------------------------------------------------------------------
// Object store

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    /// `get` on these keys fails with a download error
    pub broken: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    /// Most `get` calls seen running at once
    pub peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn break_key(&self, key: &str) {
        self.broken.lock().unwrap().insert(key.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        self.insert(key, bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.broken.lock().unwrap().contains(key) {
            return Err(StorageError::request(Operation::Get, key, "connection reset"));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog

#[derive(Default)]
pub struct CatalogState {
    pub videos: HashMap<VideoId, Video>,
    pub frames: Vec<Frame>,
    pub labels: HashMap<LabelId, Label>,
    pub annotations: Vec<Annotation>,
    pub embeddings: HashMap<FrameId, Vec<f32>>,
    pub insert_calls: usize,
    pub upsert_calls: usize,
    /// `mark_failed` returns a server error
    pub fail_mark_failed: bool,
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn add_video(&self, video: Video) {
        self.state.lock().unwrap().videos.insert(video.id.clone(), video);
    }

    pub fn add_frame(&self, frame: Frame) {
        self.state.lock().unwrap().frames.push(frame);
    }

    pub fn add_label(&self, label: Label) {
        self.state.lock().unwrap().labels.insert(label.id.clone(), label);
    }

    pub fn add_annotation(&self, frame_id: &FrameId, label_id: &LabelId, bbox: NormalizedBox) {
        self.state.lock().unwrap().annotations.push(Annotation {
            id: AnnotationId::new(),
            frame_id: frame_id.clone(),
            label_id: label_id.clone(),
            bbox,
            confidence: None,
            source: Default::default(),
            reviewed: true,
            created_by: Some("annotator".to_string()),
            created_at: None,
        });
    }

    pub fn video(&self, id: &VideoId) -> Video {
        self.state.lock().unwrap().videos[id].clone()
    }

    fn apply(&self, id: &VideoId, event: VideoEvent) -> DbResult<Video> {
        let mut state = self.state.lock().unwrap();
        let video = state
            .videos
            .get_mut(id)
            .ok_or_else(|| DbError::not_found(format!("videos/{}", id)))?;
        video.status = event.apply(video.status)?;
        Ok(video.clone())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_video(&self, video_id: &VideoId) -> DbResult<Option<Video>> {
        Ok(self.state.lock().unwrap().videos.get(video_id).cloned())
    }

    async fn begin_processing(&self, video_id: &VideoId) -> DbResult<Video> {
        self.apply(video_id, VideoEvent::UploadCompleted)
    }

    async fn resume_processing(&self, video_id: &VideoId) -> DbResult<Video> {
        let mut state = self.state.lock().unwrap();
        let video = state
            .videos
            .get_mut(video_id)
            .ok_or_else(|| DbError::not_found(format!("videos/{}", video_id)))?;
        video.status = video.status.resume_for_retry()?;
        video.error_message = None;
        Ok(video.clone())
    }

    async fn complete_extraction(
        &self,
        video_id: &VideoId,
        metadata: &VideoMetadata,
    ) -> DbResult<Video> {
        self.apply(video_id, VideoEvent::ExtractionSucceeded)?;
        let mut state = self.state.lock().unwrap();
        let video = state
            .videos
            .get_mut(video_id)
            .ok_or_else(|| DbError::not_found(format!("videos/{}", video_id)))?;
        video.width = Some(metadata.width);
        video.height = Some(metadata.height);
        video.fps = Some(metadata.fps);
        video.duration = Some(metadata.duration);
        video.frame_count = Some(metadata.frame_count);
        video.error_message = None;
        Ok(video.clone())
    }

    async fn mark_failed(&self, video_id: &VideoId, error_message: &str) -> DbResult<Video> {
        if self.state.lock().unwrap().fail_mark_failed {
            return Err(DbError::ServerError(503, "unavailable".to_string()));
        }
        self.apply(video_id, VideoEvent::ExtractionFailed)?;
        let mut state = self.state.lock().unwrap();
        let video = state
            .videos
            .get_mut(video_id)
            .ok_or_else(|| DbError::not_found(format!("videos/{}", video_id)))?;
        video.error_message = Some(framelab_db::truncate_error_message(error_message));
        Ok(video.clone())
    }

    async fn upsert_frames(&self, frames: &[FrameDescriptor]) -> DbResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;
        for d in frames {
            state
                .frames
                .retain(|f| !(f.video_id == d.video_id && f.frame_number == d.frame_number));
            state.frames.push(Frame {
                id: FrameId::new(),
                video_id: d.video_id.clone(),
                frame_number: d.frame_number,
                timestamp_ms: d.timestamp_ms,
                storage_key: d.storage_key.clone(),
                thumbnail_key: d.thumbnail_key.clone(),
                width: Some(d.width),
                height: Some(d.height),
                embedding: None,
            });
        }
        Ok(frames.len())
    }

    async fn list_frames_page(
        &self,
        video_id: &VideoId,
        offset: usize,
        limit: usize,
    ) -> DbResult<Vec<Frame>> {
        let state = self.state.lock().unwrap();
        let mut frames: Vec<Frame> = state
            .frames
            .iter()
            .filter(|f| &f.video_id == video_id)
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.frame_number);
        Ok(frames.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_frames(&self, frame_ids: &[FrameId]) -> DbResult<Vec<Frame>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .frames
            .iter()
            .filter(|f| frame_ids.contains(&f.id))
            .cloned()
            .collect())
    }

    async fn set_frame_embedding(&self, frame_id: &FrameId, embedding: &[f32]) -> DbResult<()> {
        self.state
            .lock()
            .unwrap()
            .embeddings
            .insert(frame_id.clone(), embedding.to_vec());
        Ok(())
    }

    async fn get_label(&self, label_id: &LabelId) -> DbResult<Option<Label>> {
        Ok(self.state.lock().unwrap().labels.get(label_id).cloned())
    }

    async fn list_annotations(
        &self,
        label_id: &LabelId,
        frame_ids: &[FrameId],
    ) -> DbResult<Vec<Annotation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .annotations
            .iter()
            .filter(|a| &a.label_id == label_id && frame_ids.contains(&a.frame_id))
            .cloned()
            .collect())
    }

    async fn insert_annotations(&self, annotations: &[NewAnnotation]) -> DbResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        for a in annotations {
            state.annotations.push(Annotation {
                id: AnnotationId::new(),
                frame_id: a.frame_id.clone(),
                label_id: a.label_id.clone(),
                bbox: a.bbox,
                confidence: a.confidence,
                source: a.source,
                reviewed: a.reviewed,
                created_by: a.created_by.clone(),
                created_at: None,
            });
        }
        Ok(annotations.len())
    }

    async fn delete_frame_annotations(&self, frame_id: &FrameId) -> DbResult<usize> {
        let mut state = self.state.lock().unwrap();
        let before = state.annotations.len();
        state.annotations.retain(|a| &a.frame_id != frame_id);
        Ok(before - state.annotations.len())
    }

    async fn match_frames(
        &self,
        _project_id: &ProjectId,
        _embedding: &[f32],
        _limit: usize,
    ) -> DbResult<Vec<FrameMatch>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Inference

/// Returns canned detections keyed by image bytes.
#[derive(Default)]
pub struct FakeDetector {
    pub responses: Mutex<HashMap<Vec<u8>, Vec<Detection>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeDetector {
    pub fn respond(&self, image: &[u8], detections: Vec<Detection>) {
        self.responses
            .lock()
            .unwrap()
            .insert(image.to_vec(), detections);
    }
}

#[async_trait]
impl Detector for FakeDetector {
    async fn segment(&self, image: &[u8], prompt: &str) -> MlResult<Vec<Detection>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records batch sizes and returns a constant vector per image.
#[derive(Default)]
pub struct FakeEmbedder {
    pub batches: Mutex<Vec<usize>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_images(&self, images: &[Vec<u8>]) -> MlResult<Vec<Vec<f32>>> {
        if *self.fail.lock().unwrap() {
            return Err(MlError::ServiceUnavailable("embedder down".to_string()));
        }
        self.batches.lock().unwrap().push(images.len());
        Ok(images.iter().map(|_| vec![0.25; 4]).collect())
    }

    async fn embed_text(&self, _text: &str) -> MlResult<Vec<f32>> {
        Ok(vec![0.25; 4])
    }
}

// ---------------------------------------------------------------------------
// Decoder

/// Probes to a fixed duration and writes a small JPEG for every frame.
pub struct FakeDecoder {
    pub info: VideoInfo,
    pub frame: Vec<u8>,
    pub seeks: Mutex<Vec<f64>>,
    /// Decoding the n-th seek (0-based) fails
    pub fail_at: Option<usize>,
    /// Source paths seen by `probe`, to check scratch cleanup
    pub sources: Mutex<Vec<PathBuf>>,
}

impl FakeDecoder {
    pub fn new(duration: f64) -> Self {
        Self {
            info: VideoInfo {
                duration,
                width: 64,
                height: 36,
                fps: 25.0,
            },
            frame: jpeg(64, 36),
            seeks: Mutex::new(Vec::new()),
            fail_at: None,
            sources: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VideoDecoder for FakeDecoder {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        self.sources.lock().unwrap().push(path.to_path_buf());
        Ok(self.info.clone())
    }

    async fn extract_frame(&self, _path: &Path, seconds: f64, output: &Path) -> MediaResult<()> {
        let index = {
            let mut seeks = self.seeks.lock().unwrap();
            seeks.push(seconds);
            seeks.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(MediaError::tool_failed(Tool::Ffmpeg, "decode error", None, Some(1)));
        }
        tokio::fs::write(output, &self.frame).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    Accept,
    Duplicate,
    Fail,
}

#[derive(Default)]
pub struct RecordingSink {
    pub jobs: Mutex<Vec<QueueJob>>,
    pub mode: Mutex<SinkMode>,
}

#[async_trait]
impl JobSink for RecordingSink {
    async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        match *self.mode.lock().unwrap() {
            SinkMode::Accept => {
                let id = job.job_id().to_string();
                self.jobs.lock().unwrap().push(job);
                Ok(id)
            }
            SinkMode::Duplicate => Err(QueueError::Duplicate(job.idempotency_key())),
            SinkMode::Fail => Err(QueueError::unavailable("redis unreachable")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<MemoryCatalog>,
    pub detector: Arc<FakeDetector>,
    pub embedder: Arc<FakeEmbedder>,
    pub decoder: Arc<FakeDecoder>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(decoder: FakeDecoder) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            catalog: Arc::new(MemoryCatalog::default()),
            detector: Arc::new(FakeDetector::default()),
            embedder: Arc::new(FakeEmbedder::default()),
            decoder: Arc::new(decoder),
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn ctx(&self) -> WorkerContext {
        WorkerContext {
            storage: self.store.clone(),
            catalog: self.catalog.clone(),
            detector: self.detector.clone(),
            embedder: self.embedder.clone(),
            decoder: self.decoder.clone(),
            pipeline: PipelineConfig::default(),
            work_dir: self.work_dir.path().join("scratch"),
        }
    }

    /// Scratch directories still present under the work dir.
    pub fn leftover_scratch(&self) -> usize {
        std::fs::read_dir(self.work_dir.path().join("scratch"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn video(id: &str, status: VideoStatus) -> Video {
    Video {
        id: VideoId::from(id),
        project_id: ProjectId::from("p1"),
        status,
        storage_key: format!("projects/p1/videos/{}/source.mp4", id),
        width: None,
        height: None,
        fps: None,
        duration: None,
        frame_count: None,
        error_message: None,
        created_at: None,
        updated_at: None,
    }
}

/// Frame with a distinct image stored under its key.
pub fn frame(store: &MemoryStore, video_id: &str, n: u32, width: u32, height: u32) -> Frame {
    let storage_key = format!("projects/p1/videos/{}/frames/{:06}.jpg", video_id, n);
    store.insert(&storage_key, format!("image-{}-{}", video_id, n).into_bytes());
    Frame {
        id: FrameId::from(format!("{}-f{}", video_id, n)),
        video_id: VideoId::from(video_id),
        frame_number: n,
        timestamp_ms: n as u64 * 1000,
        storage_key,
        thumbnail_key: format!("projects/p1/videos/{}/thumbnails/{:06}.jpg", video_id, n),
        width: Some(width),
        height: Some(height),
        embedding: None,
    }
}
