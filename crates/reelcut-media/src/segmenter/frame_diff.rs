//! Grayscale frame-difference shot detection.

use async_trait::async_trait;
use image::GrayImage;
use std::path::Path;
use tracing::debug;

use reelcut_models::Segment;

use super::{ShotDetector, ShotParams, DEFAULT_ANALYSIS_WIDTH};
use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::frames::{PixelFormat, RawFrameStream};
use crate::probe::VideoInfo;

/// Sequential detector: when the mean absolute grayscale difference between
/// consecutive frames exceeds the threshold, the open shot is closed.
#[derive(Debug, Clone)]
pub struct FrameDifferenceDetector {
    analysis_width: u32,
}

impl Default for FrameDifferenceDetector {
    fn default() -> Self {
        Self {
            analysis_width: DEFAULT_ANALYSIS_WIDTH,
        }
    }
}

impl FrameDifferenceDetector {
    pub fn new(analysis_width: u32) -> Self {
        Self {
            analysis_width: analysis_width.max(16),
        }
    }
}

#[async_trait]
impl ShotDetector for FrameDifferenceDetector {
    fn name(&self) -> &'static str {
        "frame_difference"
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
            PixelFormat::Gray,
            runner,
        )
        .await?;
        let fps = stream.fps();

        let mut splitter = ShotSplitter::new(params.threshold, params.min_len, fps);
        let mut previous: Option<GrayImage> = None;

        while let Some(frame) = stream.next_frame().await? {
            let index = frame.index;
            let gray = frame
                .into_gray()
                .ok_or_else(|| MediaError::internal("frame buffer size mismatch"))?;
            if let Some(prev) = &previous {
                splitter.observe(index, mean_abs_diff(prev, &gray));
            }
            previous = Some(gray);
        }

        let frames = stream.frames_read();
        if let Err(e) = stream.finish().await {
            // Some containers end with a decode error after valid frames.
            if frames == 0 {
                return Err(e);
            }
            debug!(error = %e, frames, "Decoder exited with error after frames were read");
        }
        if frames == 0 {
            return Err(MediaError::input_unreadable(source, "no frames decoded"));
        }

        Ok(splitter.finish(frames))
    }
}

#[derive(Debug)]
struct ShotSplitter {
    threshold: f64,
    min_len: f64,
    fps: f64,
    shot_start_frame: u64,
    shots: Vec<Segment>,
}

impl ShotSplitter {
    fn new(threshold: f64, min_len: f64, fps: f64) -> Self {
        Self {
            threshold,
            min_len,
            fps: if fps > 0.0 { fps } else { 30.0 },
            shot_start_frame: 0,
            shots: Vec::new(),
        }
    }

    fn time(&self, frame: u64) -> f64 {
        frame as f64 / self.fps
    }

    fn close(&mut self, end_frame: u64) {
        let start = self.time(self.shot_start_frame);
        let end = self.time(end_frame);
        if end - start >= self.min_len {
            if let Ok(seg) = Segment::new(start, end) {
                self.shots.push(seg);
            }
        }
    }

    fn observe(&mut self, frame: u64, score: f64) {
        if score > self.threshold {
            self.close(frame);
            self.shot_start_frame = frame;
        }
    }

    fn finish(mut self, total_frames: u64) -> Vec<Segment> {
        self.close(total_frames);
        self.shots
    }
}

fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
    let (a, b) = (a.as_raw(), b.as_raw());
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = a.iter().zip(b.iter()).map(|(x, y)| x.abs_diff(*y) as u64).sum();
    sum as f64 / n as f64
}
