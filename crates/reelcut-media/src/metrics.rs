//! Metrics emitted by media stages. Installing an exporter is up to the caller.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FALLBACKS_TOTAL: &str = "reelcut_fallbacks_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "reelcut_ffmpeg_duration_seconds";
}

/// Record that an optional capability was skipped or replaced.
pub fn record_fallback(capability: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "capability" => capability).increment(1);
}

/// Record wall time of one FFmpeg task.
pub fn record_ffmpeg_duration(task: &'static str, duration_secs: f64) {
    histogram!(names::FFMPEG_DURATION_SECONDS, "task" => task).record(duration_secs);
}
