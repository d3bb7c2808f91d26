//! Pipeline error types.

use thiserror::Error;

use reelcut_media::MediaError;
use reelcut_models::PipelineStage;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required stage failed; the run is aborted.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: MediaError,
    },

    #[error("No excerpts to render")]
    NothingToRender,

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap a media error raised while in `stage`. Cancellation keeps its own variant.
    pub fn stage(stage: PipelineStage, source: MediaError) -> Self {
        if source.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Stage { stage, source }
        }
    }

    /// Stage in which the run failed, if it failed inside one.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True when the source itself could not be read.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::Stage { source, .. } => source.is_input_error(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = PipelineError::stage(
            PipelineStage::Segmenting,
            MediaError::input_unreadable("/v.mp4", "no video stream"),
        );
        assert_eq!(err.failed_stage(), Some(PipelineStage::Segmenting));
        assert!(err.is_input_error());
        assert!(err.to_string().starts_with("segmenting stage failed"));
    }

    #[test]
    fn test_missing_source_is_a_segmenting_failure() {
        let err = PipelineError::stage(
            PipelineStage::Segmenting,
            MediaError::FileNotFound("/gone.mp4".into()),
        );
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "segmenting stage failed: source does not exist: /gone.mp4");
    }

    #[test]
    fn test_cancellation_is_not_a_stage_failure() {
        let err = PipelineError::stage(PipelineStage::Enhancing, MediaError::Cancelled);
        assert!(err.is_cancelled());
        assert_eq!(err.failed_stage(), None);
    }
}
