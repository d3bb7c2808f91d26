//! Pipeline stage state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Segmenting,
    Selecting,
    Reframing,
    Enhancing,
    Captioning,
    Rendering,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Segmenting => "segmenting",
            PipelineStage::Selecting => "selecting",
            PipelineStage::Reframing => "reframing",
            PipelineStage::Enhancing => "enhancing",
            PipelineStage::Captioning => "captioning",
            PipelineStage::Rendering => "rendering",
            PipelineStage::Done => "done",
        }
    }

    /// The following stage. `Done` is terminal.
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Segmenting => Some(PipelineStage::Selecting),
            PipelineStage::Selecting => Some(PipelineStage::Reframing),
            PipelineStage::Reframing => Some(PipelineStage::Enhancing),
            PipelineStage::Enhancing => Some(PipelineStage::Captioning),
            PipelineStage::Captioning => Some(PipelineStage::Rendering),
            PipelineStage::Rendering => Some(PipelineStage::Done),
            PipelineStage::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
