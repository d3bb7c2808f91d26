//! Media layer errors.
//!
//! Variants fall in three groups: the tools themselves are missing, the
//! source is unusable, or an optional capability could not run. The worker
//! turns the last group into recorded fallbacks instead of failing the run.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg is not installed or not on PATH")]
    FfmpegNotFound,

    #[error("ffprobe is not installed or not on PATH")]
    FfprobeNotFound,

    /// A transcode exited non-zero. `stderr` holds the tail of its log.
    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("source does not exist: {0}")]
    FileNotFound(PathBuf),

    /// The source cannot be opened or decoded.
    #[error("cannot read {path}: {reason}")]
    InputUnreadable { path: PathBuf, reason: String },

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("bad transcript: {0}")]
    Srt(#[from] reelcut_models::SrtParseError),

    #[error("bad segment: {0}")]
    Segment(#[from] reelcut_models::SegmentError),

    #[error("cancelled")]
    Cancelled,

    #[error("ffmpeg exceeded its {0}s budget")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame decode: {0}")]
    Image(#[from] image::ImageError),

    #[error("subject detector: {0}")]
    DetectionFailed(String),

    #[error("detector model missing at {0}")]
    ModelNotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn input_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn capability_unavailable(message: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(message.into())
    }

    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stopped from outside rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The source itself is unusable, so retrying with fallbacks cannot help.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::FileNotFound(_) | Self::InputUnreadable { .. })
    }

    /// Missing tooling, as opposed to a bad source or a failed transcode.
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, Self::FfmpegNotFound | Self::FfprobeNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MediaError::FileNotFound("a.mp4".into()).is_input_error());
        assert!(MediaError::input_unreadable("a.mp4", "moov atom not found").is_input_error());
        assert!(!MediaError::Cancelled.is_input_error());
        assert!(MediaError::Cancelled.is_cancelled());
        assert!(MediaError::FfprobeNotFound.is_missing_tool());
        assert!(!MediaError::ffmpeg_failed("exit 1", None, Some(1)).is_missing_tool());
    }

    #[test]
    fn test_unreadable_message_names_path() {
        let err = MediaError::input_unreadable("/in/talk.mp4", "no video stream found");
        assert_eq!(err.to_string(), "cannot read /in/talk.mp4: no video stream found");
    }
}
