//! FFmpeg CLI wrapper for frame sampling.
//!
//! This crate provides:
//! - Video probing via `ffprobe`
//! - Type-safe FFmpeg command building with timeouts
//! - The fixed-interval sampling schedule
//! - Single-frame decoding and fixed-size thumbnails
//! - The [`VideoDecoder`] seam used by frame extraction

pub mod command;
pub mod decoder;
pub mod error;
pub mod probe;
pub mod sampling;
pub mod thumbnail;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use decoder::{FfmpegDecoder, VideoDecoder};
pub use error::{MediaError, MediaResult, Tool};
pub use probe::{probe_video, VideoInfo};
pub use sampling::{sample_schedule, SamplePoint, DEFAULT_FRAME_INTERVAL_SECS, MAX_SAMPLE_POINTS};
pub use thumbnail::{image_dimensions, make_thumbnail, ThumbnailSpec};
