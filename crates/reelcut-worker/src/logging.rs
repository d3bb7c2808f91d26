//! Structured stage logging utilities.
//!
//! Provides consistent, structured logging for pipeline stages with
//! tracing spans and contextual information.

use std::time::Duration;
use tracing::{error, info, warn, Span};

use reelcut_models::{PipelineStage, RunId};

/// Stage logger for structured logging with consistent formatting.
///
/// Every line carries the run ID and the stage name.
#[derive(Debug, Clone)]
pub struct StageLogger {
    run_id: String,
    stage: PipelineStage,
}

impl StageLogger {
    pub fn new(run_id: &RunId, stage: PipelineStage) -> Self {
        Self {
            run_id: run_id.short().to_string(),
            stage,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Stage failed: {}", message
        );
    }

    pub fn log_completion(&self, elapsed: Duration, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Span for work done inside this stage.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "stage",
            run_id = %self.run_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_logger_creation() {
        let run_id = RunId::from_string("0123456789abcdef");
        let logger = StageLogger::new(&run_id, PipelineStage::Reframing);

        assert_eq!(logger.run_id(), "01234567");
        assert_eq!(logger.stage(), PipelineStage::Reframing);
    }
}
