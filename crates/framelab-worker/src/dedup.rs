//! Confidence and IoU based selection of detector candidates.
//!
//! Candidates are normalized to the frame, sorted by confidence (highest
//! first, ties in detector order) and accepted greedily: a candidate must
//! clear the confidence threshold and overlap every box already on the frame
//! (persisted or accepted earlier in the same pass) by less than the IoU
//! threshold.

use std::cmp::Ordering;

use framelab_ml_client::Detection;
use framelab_models::NormalizedBox;

/// Thresholds for one selection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionParams {
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.5,
        }
    }
}

/// A candidate in frame-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: NormalizedBox,
    pub confidence: f64,
}

/// Outcome of one frame's selection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// In acceptance order (descending confidence)
    pub accepted: Vec<Candidate>,
    /// Candidates dropped for overlapping an existing or accepted box
    pub duplicates_skipped: usize,
    /// Candidates with no area left after clamping
    pub invalid: usize,
}

/// Convert pixel detections into clamped normalized candidates.
///
/// Boxes that collapse to zero width or height after clamping are counted and
/// dropped.
pub fn normalize_detections(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
) -> (Vec<Candidate>, usize) {
    let mut invalid = 0;
    let candidates = detections
        .iter()
        .filter_map(|d| {
            let bbox = NormalizedBox::from_pixels(&d.bbox, image_width, image_height);
            if bbox.is_valid() && d.confidence.is_finite() {
                Some(Candidate {
                    bbox,
                    confidence: d.confidence,
                })
            } else {
                invalid += 1;
                None
            }
        })
        .collect();
    (candidates, invalid)
}

/// Greedy selection against `existing` boxes.
pub fn select_candidates(
    existing: &[NormalizedBox],
    mut candidates: Vec<Candidate>,
    params: SelectionParams,
) -> Selection {
    // Stable sort keeps detector order among equal scores
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut selection = Selection::default();
    let mut occupied: Vec<NormalizedBox> = existing.to_vec();

    for candidate in candidates {
        if candidate.confidence < params.confidence_threshold {
            // Sorted descending, nothing after this can pass
            break;
        }

        let duplicate = occupied
            .iter()
            .any(|b| candidate.bbox.iou(b) >= params.iou_threshold);
        if duplicate {
            selection.duplicates_skipped += 1;
            continue;
        }

        occupied.push(candidate.bbox);
        selection.accepted.push(candidate);
    }

    selection
}

/// Normalize then select in one step.
pub fn select_detections(
    existing: &[NormalizedBox],
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
    params: SelectionParams,
) -> Selection {
    let (candidates, invalid) = normalize_detections(detections, image_width, image_height);
    let mut selection = select_candidates(existing, candidates, params);
    selection.invalid = invalid;
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelab_models::PixelBox;

    fn detection(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> Detection {
        Detection {
            bbox: PixelBox::new(x, y, w, h),
            confidence,
        }
    }

    #[test]
    fn test_accepts_only_strong_distinct_candidate() {
        // B overlaps A with IoU 0.6: A = [0,0,100,100], B = [0,0,100,60] -> 6000/10000
        let detections = [
            detection(0.0, 0.0, 100.0, 100.0, 0.9),
            detection(0.0, 0.0, 100.0, 60.0, 0.7),
            detection(300.0, 300.0, 50.0, 50.0, 0.4),
        ];
        let a = NormalizedBox::from_pixels(&detections[0].bbox, 1000, 1000);
        let b = NormalizedBox::from_pixels(&detections[1].bbox, 1000, 1000);
        assert!((a.iou(&b) - 0.6).abs() < 1e-9);

        let selection =
            select_detections(&[], &detections, 1000, 1000, SelectionParams::default());

        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.accepted[0].confidence, 0.9);
        assert_eq!(selection.accepted[0].bbox, a);
        assert_eq!(selection.duplicates_skipped, 1);
    }

    #[test]
    fn test_identical_boxes_keep_highest_score() {
        let detections = [
            detection(10.0, 10.0, 50.0, 50.0, 0.90),
            detection(10.0, 10.0, 50.0, 50.0, 0.95),
        ];
        let selection = select_detections(&[], &detections, 640, 480, SelectionParams::default());

        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.accepted[0].confidence, 0.95);
        assert_eq!(selection.duplicates_skipped, 1);
    }

    #[test]
    fn test_existing_boxes_suppress_candidates() {
        let existing = [NormalizedBox::new(0.0, 0.0, 0.5, 0.5)];
        let detections = [detection(0.0, 0.0, 320.0, 240.0, 0.99)];
        let selection =
            select_detections(&existing, &detections, 640, 480, SelectionParams::default());

        assert!(selection.accepted.is_empty());
        assert_eq!(selection.duplicates_skipped, 1);
    }

    #[test]
    fn test_below_threshold_is_not_a_duplicate() {
        let detections = [detection(0.0, 0.0, 10.0, 10.0, 0.2)];
        let selection = select_detections(&[], &detections, 100, 100, SelectionParams::default());

        assert!(selection.accepted.is_empty());
        assert_eq!(selection.duplicates_skipped, 0);
    }

    #[test]
    fn test_overflowing_box_is_clamped_to_edge() {
        let detections = [detection(480.0, 0.0, 400.0, 100.0, 0.8)];
        let selection = select_detections(&[], &detections, 640, 480, SelectionParams::default());

        let bbox = selection.accepted[0].bbox;
        assert_eq!(bbox.x + bbox.width, 1.0);
        assert!(bbox.x2() <= 1.0);
    }

    #[test]
    fn test_off_frame_box_is_invalid() {
        let detections = [detection(700.0, 10.0, 50.0, 50.0, 0.9)];
        let selection = select_detections(&[], &detections, 640, 480, SelectionParams::default());

        assert!(selection.accepted.is_empty());
        assert_eq!(selection.invalid, 1);
    }

    #[test]
    fn test_ties_keep_detector_order() {
        let detections = [
            detection(0.0, 0.0, 10.0, 10.0, 0.8),
            detection(50.0, 50.0, 10.0, 10.0, 0.8),
        ];
        let selection = select_detections(&[], &detections, 100, 100, SelectionParams::default());

        assert_eq!(selection.accepted.len(), 2);
        assert_eq!(selection.accepted[0].bbox.x, 0.0);
        assert_eq!(selection.accepted[1].bbox.x, 0.5);
    }
}
