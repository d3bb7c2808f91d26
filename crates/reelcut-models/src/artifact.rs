use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A media file produced by one pipeline stage for one excerpt.
///
/// Each stage creates a new artifact from its input and never rewrites a
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub path: PathBuf,
    /// Chronological position of the excerpt among the selected ones.
    pub index: usize,
}

impl PipelineArtifact {
    pub fn new(path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
