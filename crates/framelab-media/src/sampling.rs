//! Fixed-interval sampling schedule.

use crate::error::{MediaError, MediaResult};

/// Default wall-clock distance between two sampled frames.
pub const DEFAULT_FRAME_INTERVAL_SECS: f64 = 1.0;

/// Largest schedule a single video may produce.
pub const MAX_SAMPLE_POINTS: u32 = 100_000;

/// One sampled instant of a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// 0-based position in the schedule
    pub frame_number: u32,
    /// Seek position in seconds
    pub seconds: f64,
    /// Seek position in whole milliseconds
    pub timestamp_ms: u64,
}

/// Sample instants from `t = 0` up to, but excluding, `duration`.
///
/// Positions are computed as `n * interval` rather than by accumulation so
/// long videos do not drift. A non-positive interval or duration yields an
/// empty schedule. More than [`MAX_SAMPLE_POINTS`] samples is an error.
pub fn sample_schedule(duration_secs: f64, interval_secs: f64) -> MediaResult<Vec<SamplePoint>> {
    if !(duration_secs > 0.0) || !(interval_secs > 0.0) {
        return Ok(Vec::new());
    }

    let count = (duration_secs / interval_secs).ceil();
    if !(count <= MAX_SAMPLE_POINTS as f64) {
        return Err(MediaError::invalid_video(format!(
            "sampling {:.3}s every {}s exceeds {} frames",
            duration_secs, interval_secs, MAX_SAMPLE_POINTS
        )));
    }

    let points = (0..=count as u32)
        .map(|n| (n, n as f64 * interval_secs))
        .take_while(|&(_, seconds)| seconds < duration_secs)
        .map(|(n, seconds)| SamplePoint {
            frame_number: n,
            seconds,
            timestamp_ms: (seconds * 1000.0).round() as u64,
        })
        .collect();
    Ok(points)
}
