mod common;

use common::{frame, video, FakeDecoder, Harness};

use framelab_models::{VideoId, VideoStatus};
use framelab_queue::ExtractEmbeddingsJob;
use framelab_worker::jobs::EmbeddingExtraction;
use framelab_worker::{run_attempt, AttemptOutcome, Job, PipelineConfig, Timeouts};
use std::sync::atomic::Ordering;

use tokio_test::assert_err;

fn job(video_id: &str) -> EmbeddingExtraction {
    EmbeddingExtraction::new(ExtractEmbeddingsJob::new(VideoId::from(video_id)))
}

fn seed_frames(h: &Harness, count: u32) {
    h.catalog.add_video(video("v1", VideoStatus::Ready));
    for n in 0..count {
        h.catalog.add_frame(frame(&h.store, "v1", n, 64, 36));
    }
}

#[tokio::test]
async fn test_nineteen_frames_embed_in_three_batches() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 19);

    let summary = job("v1").execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(*h.embedder.batches.lock().unwrap(), vec![8, 8, 3]);
    assert_eq!(summary.frames_total, 19);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.embeddings_stored, 19);
    assert_eq!(h.catalog.state.lock().unwrap().embeddings.len(), 19);
}

#[tokio::test]
async fn test_download_failure_skips_only_that_frame() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 19);
    h.store.break_key("projects/p1/videos/v1/frames/000009.jpg");

    let summary = job("v1").execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(*h.embedder.batches.lock().unwrap(), vec![8, 7, 3]);
    assert_eq!(summary.embeddings_stored, 18);
    assert_eq!(summary.frames_skipped, 1);

    let state = h.catalog.state.lock().unwrap();
    assert!(!state
        .embeddings
        .contains_key(&framelab_models::FrameId::from("v1-f9")));
}

#[tokio::test]
async fn test_batch_downloads_run_one_at_a_time() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 8);

    let summary = job("v1").execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.embeddings_stored, 8);
    assert_eq!(h.store.peak_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pages_through_all_frames() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 7);
    let mut ctx = h.ctx();
    ctx.pipeline = PipelineConfig {
        frame_page_size: 3,
        embedding_batch_size: 2,
        ..PipelineConfig::default()
    };

    let summary = job("v1").execute(&ctx, 1).await.unwrap();

    assert_eq!(summary.frames_total, 7);
    assert_eq!(*h.embedder.batches.lock().unwrap(), vec![2, 2, 2, 1]);
}

#[tokio::test]
async fn test_batch_failure_is_retried() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 4);
    *h.embedder.fail.lock().unwrap() = true;

    let outcome = run_attempt(&job("v1"), &h.ctx(), 1, Timeouts::default()).await;

    match outcome {
        AttemptOutcome::Retry { after, .. } => assert_eq!(after.as_secs(), 120),
        other => panic!("expected retry, got {:?}", other),
    }
    assert!(h.catalog.state.lock().unwrap().embeddings.is_empty());
}

#[tokio::test]
async fn test_video_without_frames_stores_nothing() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_frames(&h, 0);

    let summary = job("v1").execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.frames_total, 0);
    assert_eq!(summary.batches, 0);
    assert!(h.embedder.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_video_is_not_found() {
    let h = Harness::new(FakeDecoder::new(0.0));

    let err = assert_err!(job("ghost").execute(&h.ctx(), 1).await);

    assert_eq!(err.kind(), framelab_worker::ErrorKind::NotFound);
}
