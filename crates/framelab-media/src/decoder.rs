//! Video decoding seam.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Probe a local video and decode single frames out of it.
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Read duration, dimensions and frame rate.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Decode the frame at `seconds` into an image file at `output`.
    async fn extract_frame(&self, path: &Path, seconds: f64, output: &Path) -> MediaResult<()>;
}

/// [`VideoDecoder`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    runner: FfmpegRunner,
    jpeg_qscale: u8,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl FfmpegDecoder {
    /// Create a decoder whose per-frame FFmpeg calls time out after `frame_timeout`.
    pub fn new(frame_timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(frame_timeout),
            jpeg_qscale: 2,
        }
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn extract_frame(&self, path: &Path, seconds: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(path, output)
            .seek(seconds)
            .single_frame()
            .image_quality(self.jpeg_qscale);

        self.runner.run(&cmd).await?;

        // FFmpeg exits 0 without writing anything when seeking past the last frame
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::invalid_video(format!(
                "No frame decoded at {:.3}s",
                seconds
            )));
        }
        Ok(())
    }
}
