//! Pipeline-level metrics.

use metrics::{counter, histogram};

use reelcut_models::PipelineStage;

pub mod names {
    pub const STAGE_SECONDS: &str = "reelcut_stage_seconds";
    pub const RUNS_TOTAL: &str = "reelcut_runs_total";
}

/// Record wall time spent in a stage.
pub fn record_stage_duration(stage: PipelineStage, duration_secs: f64) {
    histogram!(names::STAGE_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

/// Count a finished run by outcome (`ok`, `failed`, `cancelled`).
pub fn record_run(outcome: &'static str) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
}
