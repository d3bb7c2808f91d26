//! Run summary handed back to callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use reelcut_models::{PipelineStage, RunId, Segment, StylePreset};

/// A degraded optional step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub capability: String,
    /// Excerpt index, or `None` for run-wide fallbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<usize>,
    pub reason: String,
}

impl Fallback {
    pub fn run_wide(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            excerpt: None,
            reason: reason.into(),
        }
    }

    pub fn for_excerpt(
        capability: impl Into<String>,
        excerpt: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            excerpt: Some(excerpt),
            reason: reason.into(),
        }
    }
}

/// Wall time spent in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub seconds: f64,
}

/// Metadata describing a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub source: PathBuf,
    /// Final deliverable.
    pub deliverable: PathBuf,
    /// Whether the deliverable went through loudness normalization.
    pub normalized: bool,
    pub style: StylePreset,
    pub preview: bool,
    pub source_duration: f64,
    /// Excerpts in render order.
    pub segments: Vec<Segment>,
    pub crossfade: f64,
    pub expected_duration: f64,
    pub stage_timings: Vec<StageTiming>,
    pub fallbacks: Vec<Fallback>,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Fallbacks taken for `capability`.
    pub fn fallbacks_for<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'a Fallback> {
        self.fallbacks.iter().filter(move |f| f.capability == capability)
    }

    pub fn total_seconds(&self) -> f64 {
        self.stage_timings.iter().map(|t| t.seconds).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: RunId::from_string("run-1"),
            source: PathBuf::from("/in/talk.mp4"),
            deliverable: PathBuf::from("/out/final_20260101_120000_deadbeef_ln.mp4"),
            normalized: true,
            style: StylePreset::Warm,
            preview: false,
            source_duration: 600.0,
            segments: vec![Segment::new(10.0, 15.0).unwrap()],
            crossfade: 0.4,
            expected_duration: 5.0,
            stage_timings: vec![
                StageTiming { stage: PipelineStage::Segmenting, seconds: 2.5 },
                StageTiming { stage: PipelineStage::Rendering, seconds: 1.5 },
            ],
            fallbacks: vec![
                Fallback::run_wide("transcript", "no transcript source configured"),
                Fallback::for_excerpt("lut", 0, "no .cube table found"),
            ],
        }
    }

    #[test]
    fn test_summary_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&summary().to_json().unwrap()).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["style"], "warm");
        assert_eq!(json["stage_timings"][0]["stage"], "segmenting");
        assert_eq!(json["segments"][0]["start"], 10.0);
        assert!(json["fallbacks"][0].get("excerpt").is_none());
        assert_eq!(json["fallbacks"][1]["excerpt"], 0);
    }

    #[test]
    fn test_fallback_queries() {
        let s = summary();
        assert_eq!(s.fallbacks_for("lut").count(), 1);
        assert_eq!(s.fallbacks_for("stabilizer").count(), 0);
        assert!((s.total_seconds() - 4.0).abs() < 1e-9);
    }
}
