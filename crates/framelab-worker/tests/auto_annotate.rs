mod common;

use common::{frame, FakeDecoder, Harness};

use framelab_ml_client::Detection;
use framelab_models::{
    AnnotationSource, FrameId, Label, LabelId, NormalizedBox, PixelBox, ProjectId,
};
use framelab_queue::AutoAnnotateJob;
use framelab_worker::jobs::AutoAnnotation;
use framelab_worker::{ErrorKind, Job};
use tokio_test::assert_err;

fn det(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
    Detection {
        bbox: PixelBox::new(x, y, w, h),
        confidence,
    }
}

fn seed_label(h: &Harness) -> LabelId {
    let label = Label {
        id: LabelId::from("l1"),
        project_id: ProjectId::from("p1"),
        name: "forklift".to_string(),
    };
    h.catalog.add_label(label.clone());
    label.id
}

fn job(frames: &[&str]) -> AutoAnnotation {
    AutoAnnotation::new(AutoAnnotateJob::new(
        ProjectId::from("p1"),
        LabelId::from("l1"),
        frames.iter().map(|f| FrameId::from(*f)).collect(),
        "user-7",
    ))
}

#[tokio::test]
async fn test_keeps_confident_non_overlapping_detections() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    h.catalog.add_frame(frame(&h.store, "v1", 0, 1000, 1000));
    h.detector.respond(
        b"image-v1-0",
        vec![
            det(0.0, 0.0, 100.0, 100.0, 0.9),
            det(0.0, 0.0, 100.0, 60.0, 0.7),
            det(500.0, 500.0, 50.0, 50.0, 0.4),
        ],
    );

    let summary = job(&["v1-f0"]).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.annotations_created, 1);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.frames_failed, 0);

    let state = h.catalog.state.lock().unwrap();
    assert_eq!(state.annotations.len(), 1);
    let a = &state.annotations[0];
    assert_eq!(a.bbox, NormalizedBox::new(0.0, 0.0, 0.1, 0.1));
    assert_eq!(a.confidence, Some(0.9));
    assert_eq!(a.source, AnnotationSource::Auto);
    assert!(!a.reviewed);
    assert_eq!(a.created_by.as_deref(), Some("user-7"));
    assert_eq!(*h.detector.prompts.lock().unwrap(), vec!["forklift".to_string()]);
}

#[tokio::test]
async fn test_identical_detections_create_one_annotation() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    h.catalog.add_frame(frame(&h.store, "v1", 0, 640, 480));
    h.detector.respond(
        b"image-v1-0",
        vec![det(64.0, 48.0, 128.0, 96.0, 0.90), det(64.0, 48.0, 128.0, 96.0, 0.95)],
    );

    let summary = job(&["v1-f0"]).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.annotations_created, 1);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(h.catalog.state.lock().unwrap().annotations[0].confidence, Some(0.95));
}

#[tokio::test]
async fn test_existing_annotation_suppresses_duplicate() {
    let h = Harness::new(FakeDecoder::new(0.0));
    let label_id = seed_label(&h);
    let f = frame(&h.store, "v1", 0, 100, 100);
    h.catalog.add_frame(f.clone());
    h.catalog
        .add_annotation(&f.id, &label_id, NormalizedBox::new(0.1, 0.1, 0.5, 0.5));
    h.detector.respond(
        b"image-v1-0",
        vec![det(10.0, 10.0, 50.0, 50.0, 0.99), det(70.0, 70.0, 20.0, 20.0, 0.8)],
    );

    let summary = job(&["v1-f0"]).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.annotations_created, 1);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(h.catalog.state.lock().unwrap().annotations.len(), 2);
}

#[tokio::test]
async fn test_nothing_accepted_means_no_insert() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    h.catalog.add_frame(frame(&h.store, "v1", 0, 100, 100));
    h.detector
        .respond(b"image-v1-0", vec![det(0.0, 0.0, 10.0, 10.0, 0.1)]);

    let summary = job(&["v1-f0"]).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.annotations_created, 0);
    assert_eq!(summary.duplicates_skipped, 0);
    assert_eq!(summary.frames_failed, 0);
    assert_eq!(h.catalog.state.lock().unwrap().insert_calls, 0);
}

#[tokio::test]
async fn test_box_past_right_edge_is_clamped() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    h.catalog.add_frame(frame(&h.store, "v1", 0, 200, 100));
    h.detector
        .respond(b"image-v1-0", vec![det(150.0, 10.0, 120.0, 40.0, 0.8)]);

    job(&["v1-f0"]).execute(&h.ctx(), 1).await.unwrap();

    let state = h.catalog.state.lock().unwrap();
    let b = state.annotations[0].bbox;
    assert_eq!(b.x + b.width, 1.0);
    assert_eq!(b.x, 0.75);
}

#[tokio::test]
async fn test_failing_frame_is_counted_and_others_continue() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    let f0 = frame(&h.store, "v1", 0, 100, 100);
    let f1 = frame(&h.store, "v1", 1, 100, 100);
    h.store.break_key(&f0.storage_key);
    h.catalog.add_frame(f0);
    h.catalog.add_frame(f1);
    h.detector
        .respond(b"image-v1-1", vec![det(0.0, 0.0, 50.0, 50.0, 0.9)]);

    let summary = job(&["v1-f0", "v1-f1"]).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.frames_failed, 1);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.annotations_created, 1);
}

#[tokio::test]
async fn test_unknown_and_repeated_frame_ids_are_skipped() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    h.catalog.add_frame(frame(&h.store, "v1", 0, 100, 100));

    let summary = job(&["v1-f0", "missing", "v1-f0"])
        .execute(&h.ctx(), 1)
        .await
        .unwrap();

    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.frames_failed, 0);
    assert_eq!(h.detector.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_one_insert_for_many_frames() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);
    let mut ids = Vec::new();
    for n in 0..60 {
        let f = frame(&h.store, "v1", n, 100, 100);
        h.detector.respond(
            format!("image-v1-{}", n).as_bytes(),
            vec![det(0.0, 0.0, 20.0, 20.0, 0.9)],
        );
        ids.push(f.id.0.clone());
        h.catalog.add_frame(f);
    }
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let summary = job(&id_refs).execute(&h.ctx(), 1).await.unwrap();

    assert_eq!(summary.frames_processed, 60);
    assert_eq!(summary.annotations_created, 60);
    assert_eq!(h.catalog.state.lock().unwrap().insert_calls, 1);
}

#[tokio::test]
async fn test_rejects_invalid_requests() {
    let h = Harness::new(FakeDecoder::new(0.0));
    seed_label(&h);

    let too_many: Vec<String> = (0..1001).map(|n| format!("f{}", n)).collect();
    let refs: Vec<&str> = too_many.iter().map(String::as_str).collect();
    let err = assert_err!(job(&refs).execute(&h.ctx(), 1).await);
    assert_eq!(err.kind(), ErrorKind::Validation);

    let bad_threshold = AutoAnnotation::new(
        AutoAnnotateJob::new(
            ProjectId::from("p1"),
            LabelId::from("l1"),
            vec![FrameId::from("f1")],
            "user-7",
        )
        .with_thresholds(1.5, 0.5),
    );
    let err = assert_err!(bad_threshold.execute(&h.ctx(), 1).await);
    assert_eq!(err.kind(), ErrorKind::Validation);

    let other_project = AutoAnnotation::new(AutoAnnotateJob::new(
        ProjectId::from("p2"),
        LabelId::from("l1"),
        vec![FrameId::from("f1")],
        "user-7",
    ));
    let err = assert_err!(other_project.execute(&h.ctx(), 1).await);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_missing_label_is_not_found() {
    let h = Harness::new(FakeDecoder::new(0.0));

    let err = assert_err!(job(&["v1-f0"]).execute(&h.ctx(), 1).await);

    assert_eq!(err.kind(), ErrorKind::NotFound);
}
