//! Media errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// External media tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} is not installed")]
    ToolMissing(Tool),

    #[error("{tool} exited with status {exit_code:?}: {message}")]
    ToolFailed {
        tool: Tool,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: Tool, secs: u64 },

    #[error("source file missing: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The source decodes but cannot yield frames
    #[error("unusable video: {0}")]
    InvalidVideo(String),

    #[error("unreadable probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn tool_failed(
        tool: Tool,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    /// Retrying cannot change the outcome.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            MediaError::ToolMissing(_) | MediaError::SourceMissing(_) | MediaError::InvalidVideo(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanence() {
        assert!(MediaError::ToolMissing(Tool::Ffprobe).is_permanent());
        assert!(MediaError::invalid_video("no video stream").is_permanent());
        assert!(!MediaError::Timeout {
            tool: Tool::Ffmpeg,
            secs: 30
        }
        .is_permanent());
        assert!(!MediaError::tool_failed(Tool::Ffmpeg, "seek", None, Some(1)).is_permanent());
    }
}
