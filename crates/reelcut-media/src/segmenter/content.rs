//! Content-aware shot detection on HSV frame deltas.

use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use tracing::debug;

use reelcut_models::Segment;

use super::{shots_from_cuts, ShotDetector, ShotParams, DEFAULT_ANALYSIS_WIDTH};
use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::frames::{PixelFormat, RawFrameStream};
use crate::probe::VideoInfo;

/// Scores each consecutive frame pair by the mean absolute change of hue,
/// saturation and value, and cuts where the score exceeds the threshold.
#[derive(Debug, Clone)]
pub struct ContentShotDetector {
    analysis_width: u32,
}

impl Default for ContentShotDetector {
    fn default() -> Self {
        Self {
            analysis_width: DEFAULT_ANALYSIS_WIDTH,
        }
    }
}

impl ContentShotDetector {
    pub fn new(analysis_width: u32) -> Self {
        Self {
            analysis_width: analysis_width.max(16),
        }
    }
}

#[async_trait]
impl ShotDetector for ContentShotDetector {
    fn name(&self) -> &'static str {
        "content"
    }

    async fn detect(
        &self,
        source: &Path,
        info: &VideoInfo,
        params: &ShotParams,
        runner: &FfmpegRunner,
    ) -> MediaResult<Vec<Segment>> {
        let mut stream = RawFrameStream::open(
            source,
            info,
            self.analysis_width,
            None,
            PixelFormat::Rgb24,
            runner,
        )
        .await?;

        let mut tracker = CutTracker::new(params.threshold, params.min_len);
        let mut previous: Option<Vec<[u8; 3]>> = None;

        while let Some(frame) = stream.next_frame().await? {
            let timestamp = frame.timestamp;
            let image = frame
                .into_rgb()
                .ok_or_else(|| MediaError::internal("frame buffer size mismatch"))?;
            let hsv = hsv_pixels(&image);

            if let Some(prev) = &previous {
                tracker.observe(timestamp, content_score(prev, &hsv));
            }
            previous = Some(hsv);
        }

        let frames = stream.frames_read();
        stream.finish().await?;
        if frames == 0 {
            return Err(MediaError::input_unreadable(source, "no frames decoded"));
        }

        debug!(frames, cuts = tracker.cuts.len(), "Content scoring finished");
        Ok(shots_from_cuts(&tracker.cuts, info.duration, params.min_len))
    }
}

/// Cut bookkeeping: a cut needs a score above threshold and at least
/// `min_len` seconds since the previous boundary.
#[derive(Debug)]
struct CutTracker {
    threshold: f64,
    min_len: f64,
    last_boundary: f64,
    cuts: Vec<f64>,
}

impl CutTracker {
    fn new(threshold: f64, min_len: f64) -> Self {
        Self {
            threshold,
            min_len,
            last_boundary: 0.0,
            cuts: Vec::new(),
        }
    }

    fn observe(&mut self, timestamp: f64, score: f64) {
        if score > self.threshold && timestamp - self.last_boundary >= self.min_len {
            self.cuts.push(timestamp);
            self.last_boundary = timestamp;
        }
    }
}

/// Convert every pixel to HSV with all channels on a 0-255 scale.
fn hsv_pixels(image: &RgbImage) -> Vec<[u8; 3]> {
    image
        .pixels()
        .map(|p| rgb_to_hsv(p.0[0], p.0[1], p.0[2]))
        .collect()
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { delta / max };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    [
        (h / 360.0 * 255.0).round() as u8,
        (s * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    ]
}

/// Mean of the per-channel mean absolute differences.
fn content_score(prev: &[[u8; 3]], cur: &[[u8; 3]]) -> f64 {
    let n = prev.len().min(cur.len());
    if n == 0 {
        return 0.0;
    }
    let mut sums = [0u64; 3];
    for (a, b) in prev.iter().zip(cur.iter()) {
        for c in 0..3 {
            sums[c] += a[c].abs_diff(b[c]) as u64;
        }
    }
    sums.iter().map(|s| *s as f64 / n as f64).sum::<f64>() / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        // Pure blue sits at 240 degrees
        assert_eq!(rgb_to_hsv(0, 0, 255), [170, 255, 255]);
    }

    #[test]
    fn test_identical_frames_score_zero() {
        let img = RgbImage::from_pixel(8, 8, Rgb([40, 120, 200]));
        let hsv = hsv_pixels(&img);
        assert_eq!(content_score(&hsv, &hsv), 0.0);
    }

    #[test]
    fn test_hard_cut_scores_high() {
        let dark = hsv_pixels(&RgbImage::from_pixel(8, 8, Rgb([10, 10, 10])));
        let red = hsv_pixels(&RgbImage::from_pixel(8, 8, Rgb([230, 20, 20])));
        assert!(content_score(&dark, &red) > 27.0);
    }

    #[test]
    fn test_tracker_enforces_min_len() {
        let mut tracker = CutTracker::new(27.0, 1.0);
        tracker.observe(0.5, 90.0); // too close to start
        tracker.observe(2.0, 90.0);
        tracker.observe(2.5, 90.0); // too close to previous cut
        tracker.observe(4.0, 10.0); // below threshold
        tracker.observe(6.0, 28.0);
        assert_eq!(tracker.cuts, vec![2.0, 6.0]);
    }
}
