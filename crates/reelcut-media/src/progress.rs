//! Tracking of FFmpeg's `-progress pipe:2` key/value stream.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Keys FFmpeg emits in a progress block.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "stream_0_0_q",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Snapshot taken at the end of each progress block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub fps: f64,
    /// Output timestamp reached, in milliseconds.
    pub out_time_ms: i64,
    /// Multiple of realtime.
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Share of `total_ms` written so far, clamped to 0..=100.
    pub fn percentage(&self, total_ms: i64) -> f64 {
        if total_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 * 100.0 / total_ms as f64).clamp(0.0, 100.0)
    }

    /// Fold one stderr line into the snapshot.
    ///
    /// Returns a copy when the line closes a block (`progress=continue|end`).
    pub(crate) fn absorb(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Both keys carry microseconds in practice
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => self.frame = value.parse().unwrap_or(self.frame),
            "fps" => self.fps = value.parse().unwrap_or(self.fps),
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.is_complete |= value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }
}

/// Whether a stderr line belongs to the progress stream rather than the log.
pub(crate) fn is_progress_line(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .is_some_and(|(key, _)| PROGRESS_KEYS.contains(&key))
}

/// Progress callback that logs at debug level every `step` percent.
pub fn step_logger(
    label: &'static str,
    total_secs: f64,
    step: u32,
) -> impl Fn(FfmpegProgress) + Send + 'static {
    let total_ms = (total_secs * 1000.0) as i64;
    let step = step.max(1);
    let last_bucket = Arc::new(AtomicU32::new(0));
    move |progress: FfmpegProgress| {
        let pct = progress.percentage(total_ms) as u32;
        let bucket = pct / step;
        if bucket > last_bucket.load(Ordering::Relaxed) || progress.is_complete {
            last_bucket.store(bucket, Ordering::Relaxed);
            debug!(
                task = label,
                percent = pct,
                speed = progress.speed,
                frame = progress.frame,
                "ffmpeg progress"
            );
        }
    }
}
