//! Shot segmentation of the full source.
//!
//! A primary [`ShotDetector`] is tried first. When it is absent, fails, or
//! finds nothing, the built-in [`FrameDifferenceDetector`] runs instead.

mod content;
mod frame_diff;

pub use content::ContentShotDetector;
pub use frame_diff::FrameDifferenceDetector;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use reelcut_models::Segment;

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::metrics::record_fallback;
use crate::probe::{probe_video, VideoInfo};

/// Default content threshold.
pub const DEFAULT_THRESHOLD: f64 = 27.0;
/// Default minimum shot length in seconds.
pub const DEFAULT_MIN_LEN: f64 = 1.0;
/// Default width frames are downscaled to before scoring.
pub const DEFAULT_ANALYSIS_WIDTH: u32 = 320;

/// Detection parameters shared by all strategies.
#[derive(Debug, Clone, Copy)]
pub struct ShotParams {
    pub threshold: f64,
    pub min_len: f64,
}

impl Default for ShotParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_len: DEFAULT_MIN_LEN,
        }
    }
}

/// A shot boundary detection strategy.
#[async_trait]
pub trait ShotDetector: Send + Sync {
    /// Short name used in logs and fallback records.
    fn name(&self) -> &'static str;

    /// Detect ordered, non-overlapping shots of at least `params.min_len`.
    async fn detect(
        &self,
        source: &Path,
        info: &VideoInfo,
        params: &ShotParams,
        runner: &FfmpegRunner,
    ) -> MediaResult<Vec<Segment>>;
}

/// Result of segmenting a source.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    /// Probed source duration in seconds.
    pub duration: f64,
    /// Why the fallback strategy was used, if it was.
    pub fallback_reason: Option<String>,
}

/// Shot segmenter with an optional primary detector.
pub struct Segmenter {
    primary: Option<Arc<dyn ShotDetector>>,
    fallback: FrameDifferenceDetector,
    runner: FfmpegRunner,
}

impl Segmenter {
    pub fn new(primary: Option<Arc<dyn ShotDetector>>, runner: FfmpegRunner) -> Self {
        Self {
            primary,
            fallback: FrameDifferenceDetector::default(),
            runner,
        }
    }

    pub fn with_fallback(mut self, fallback: FrameDifferenceDetector) -> Self {
        self.fallback = fallback;
        self
    }

    /// Segment `source` into shots.
    ///
    /// Fails with an input error if the source cannot be probed or decoded.
    pub async fn detect(
        &self,
        source: &Path,
        threshold: f64,
        min_len: f64,
    ) -> MediaResult<Segmentation> {
        let info = probe_video(source).await?;
        let params = ShotParams { threshold, min_len };

        let reason = match &self.primary {
            Some(primary) => match primary.detect(source, &info, &params, &self.runner).await {
                Ok(segments) if !segments.is_empty() => {
                    info!(
                        detector = primary.name(),
                        shots = segments.len(),
                        "Shot detection complete"
                    );
                    return Ok(Segmentation {
                        segments,
                        duration: info.duration,
                        fallback_reason: None,
                    });
                }
                Ok(_) => format!("{} found no shots", primary.name()),
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => format!("{} failed: {}", primary.name(), e),
            },
            None => "no primary shot detector configured".to_string(),
        };

        warn!(reason = %reason, "Falling back to frame-difference shot detection");
        record_fallback("shot_detector");

        let segments = self
            .fallback
            .detect(source, &info, &params, &self.runner)
            .await
            .map_err(|e| {
                if e.is_cancelled() || e.is_missing_tool() {
                    e
                } else {
                    MediaError::input_unreadable(source, e.to_string())
                }
            })?;

        info!(
            detector = self.fallback.name(),
            shots = segments.len(),
            "Shot detection complete"
        );

        Ok(Segmentation {
            segments,
            duration: info.duration,
            fallback_reason: Some(reason),
        })
    }
}

/// Build shots from cut times.
///
/// Spans between consecutive boundaries (starting at 0) shorter than
/// `min_len` are dropped. The span after the last cut runs to `end` and is
/// kept only if it is at least `min_len`. No cuts yields no shots.
pub(crate) fn shots_from_cuts(cuts: &[f64], end: f64, min_len: f64) -> Vec<Segment> {
    let Some(&last_cut) = cuts.last() else {
        return Vec::new();
    };

    let mut shots = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0.0;
    for &cut in cuts {
        if cut - start >= min_len {
            if let Ok(seg) = Segment::new(start, cut) {
                shots.push(seg);
            }
        }
        start = cut;
    }

    if end - last_cut >= min_len {
        if let Ok(seg) = Segment::new(last_cut, end) {
            shots.push(seg);
        }
    }
    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_models::segment::is_ordered_non_overlapping;

    #[test]
    fn test_shots_from_cuts() {
        let shots = shots_from_cuts(&[2.0, 5.0, 9.0], 12.0, 1.0);
        let bounds: Vec<_> = shots.iter().map(|s| (s.start(), s.end())).collect();
        assert_eq!(bounds, vec![(0.0, 2.0), (2.0, 5.0), (5.0, 9.0), (9.0, 12.0)]);
        assert!(is_ordered_non_overlapping(&shots));
    }

    #[test]
    fn test_short_tail_dropped() {
        let shots = shots_from_cuts(&[4.0], 4.5, 1.0);
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].end(), 4.0);
    }

    #[test]
    fn test_short_spans_dropped_and_min_len_holds() {
        let shots = shots_from_cuts(&[0.5, 3.0, 3.4, 8.0], 10.0, 1.0);
        assert!(shots.iter().all(|s| s.duration() >= 1.0));
        assert!(is_ordered_non_overlapping(&shots));
        assert_eq!(shots.len(), 3);
    }

    #[test]
    fn test_no_cuts_no_shots() {
        assert!(shots_from_cuts(&[], 30.0, 1.0).is_empty());
    }

    struct EmptyDetector;

    #[async_trait]
    impl ShotDetector for EmptyDetector {
        fn name(&self) -> &'static str {
            "empty"
        }

        async fn detect(
            &self,
            _source: &Path,
            _info: &VideoInfo,
            _params: &ShotParams,
            _runner: &FfmpegRunner,
        ) -> MediaResult<Vec<Segment>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_input_error() {
        let segmenter = Segmenter::new(Some(Arc::new(EmptyDetector)), FfmpegRunner::new());
        let err = segmenter
            .detect(Path::new("/no/such/source.mp4"), 27.0, 1.0)
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }
}
