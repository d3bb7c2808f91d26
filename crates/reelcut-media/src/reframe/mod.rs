//! Subject-aware portrait reframing.
//!
//! One frame at the segment midpoint is sampled and passed to the optional
//! subject detector. The largest subject anchors a fixed 9:16 crop that is
//! applied to every frame of the excerpt; with no subject the crop is centred.

mod crop;
mod subject;

pub use crop::{portrait_crop, CropRect};
pub use subject::SubjectDetector;
#[cfg(feature = "opencv")]
pub use subject::YuNetSubjectDetector;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use reelcut_models::{DeliveryProfile, EncodingConfig, PipelineArtifact, Segment, SubjectBox};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frames::{extract_frame, SampledFrame};
use crate::fs_utils::{partial_path, publish};
use crate::metrics::{record_fallback, record_ffmpeg_duration};
use crate::probe::probe_video;

/// Outcome of reframing one excerpt.
#[derive(Debug, Clone)]
pub struct Reframed {
    pub artifact: PipelineArtifact,
    pub crop: CropRect,
    pub subject: Option<SubjectBox>,
    /// Why centre-crop was used, if it was.
    pub fallback_reason: Option<String>,
}

/// Cuts an excerpt out of the source and reframes it to portrait.
pub struct Reframer {
    detector: Option<Arc<dyn SubjectDetector>>,
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl Reframer {
    pub fn new(detector: Option<Arc<dyn SubjectDetector>>, runner: FfmpegRunner) -> Self {
        Self {
            detector,
            runner,
            encoding: EncodingConfig::for_intermediate(),
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Produce a 1080x1920 clip of `segment` inside `work_dir`.
    pub async fn reframe(
        &self,
        source: &Path,
        segment: &Segment,
        index: usize,
        work_dir: &Path,
    ) -> MediaResult<Reframed> {
        let scratch = TempDir::new_in(work_dir)?;
        let still = scratch.path().join(format!("sample_{:02}.png", index));
        let (crop, subject, fallback_reason) =
            match extract_frame(&self.runner, source, segment.midpoint(), &still).await {
                Ok(frame) => self.locate(&frame).await,
                Err(e) if e.is_cancelled() || e.is_missing_tool() => return Err(e),
                Err(e) => {
                    warn!(excerpt = index, error = %e, "Could not sample the midpoint frame");
                    let info = probe_video(source).await?;
                    centre_crop(
                        info.width,
                        info.height,
                        format!("midpoint frame unavailable: {}", e),
                    )
                }
            };
        if let Some(reason) = &fallback_reason {
            debug!(excerpt = index, reason = %reason, "Using centre crop");
            record_fallback("subject_detector");
        }

        let output = work_dir.join(format!("reframed_{:02}.mp4", index));
        let partial = partial_path(&output);
        let filter = format!(
            "{},scale={}:{}:flags=lanczos,setsar=1",
            crop.to_filter(),
            DeliveryProfile::WIDTH,
            DeliveryProfile::HEIGHT
        );

        let cmd = FfmpegCommand::new(source, &partial)
            .seek(segment.start())
            .duration(segment.duration())
            .video_filter(filter)
            .map("0:v:0")
            .map("0:a:0?")
            .encoding(&self.encoding);

        let started = Instant::now();
        self.runner.run(&cmd).await?;
        publish(&partial, &output).await?;
        record_ffmpeg_duration("reframe", started.elapsed().as_secs_f64());

        info!(
            excerpt = index,
            segment = %segment,
            crop_x = crop.x,
            crop_y = crop.y,
            crop_w = crop.width,
            crop_h = crop.height,
            subject = subject.is_some(),
            "Reframed excerpt"
        );

        Ok(Reframed {
            artifact: PipelineArtifact::new(output, index),
            crop,
            subject,
            fallback_reason,
        })
    }

    async fn locate(&self, frame: &SampledFrame) -> (CropRect, Option<SubjectBox>, Option<String>) {
        let Some(detector) = &self.detector else {
            return centre_crop(frame.width, frame.height, "no subject detector configured");
        };

        match detector.detect(frame).await {
            Ok(boxes) => choose_crop(frame.width, frame.height, &boxes),
            Err(MediaError::Cancelled) => {
                centre_crop(frame.width, frame.height, "detection cancelled")
            }
            Err(e) => {
                warn!(detector = detector.name(), error = %e, "Subject detection failed");
                centre_crop(
                    frame.width,
                    frame.height,
                    format!("{} failed: {}", detector.name(), e),
                )
            }
        }
    }
}

/// Centred crop, recording why no subject anchored it.
fn centre_crop(
    frame_w: u32,
    frame_h: u32,
    reason: impl Into<String>,
) -> (CropRect, Option<SubjectBox>, Option<String>) {
    (portrait_crop(frame_w, frame_h, None), None, Some(reason.into()))
}

/// Crop around the largest subject, or the frame centre when there is none.
pub fn choose_crop(
    frame_w: u32,
    frame_h: u32,
    boxes: &[SubjectBox],
) -> (CropRect, Option<SubjectBox>, Option<String>) {
    match SubjectBox::largest(boxes) {
        Some(subject) => (
            portrait_crop(frame_w, frame_h, Some(subject.center())),
            Some(subject),
            None,
        ),
        None => centre_crop(frame_w, frame_h, "no subject found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_crop_follows_largest_subject() {
        let boxes = [
            SubjectBox::new(100.0, 100.0, 50.0, 50.0, 0.99),
            SubjectBox::new(1500.0, 300.0, 200.0, 240.0, 0.7),
        ];
        let (crop, subject, reason) = choose_crop(1920, 1080, &boxes);
        assert!(reason.is_none());
        assert_eq!(subject.unwrap().x, 1500.0);
        assert_eq!(crop.x, 1600 - crop.width / 2);
        assert!(crop.fits_within(1920, 1080));
    }

    #[test]
    fn test_choose_crop_without_subject_is_centred() {
        let (crop, subject, reason) = choose_crop(1920, 1080, &[]);
        assert!(subject.is_none());
        assert!(reason.is_some());
        assert_eq!(crop, portrait_crop(1920, 1080, None));
    }

    #[test]
    fn test_centre_crop_uses_probed_geometry() {
        let (crop, subject, reason) = centre_crop(1280, 720, "midpoint frame unavailable");
        assert!(subject.is_none());
        assert_eq!(reason.as_deref(), Some("midpoint frame unavailable"));
        assert_eq!(crop, portrait_crop(1280, 720, None));
        assert!(crop.fits_within(1280, 720));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_unsampleable_midpoint_falls_back_to_centre() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.mp4");
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
            .arg("testsrc2=size=640x360:rate=30:duration=4")
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .arg(&source)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        // Midpoint lies past the last decodable frame; the cut itself still has frames.
        let reframer = Reframer::new(None, FfmpegRunner::new());
        let segment = Segment::new(3.0, 30.0).unwrap();
        let reframed = reframer.reframe(&source, &segment, 0, dir.path()).await.unwrap();
        assert_eq!(reframed.crop, portrait_crop(640, 360, None));
        assert!(reframed
            .fallback_reason
            .unwrap()
            .starts_with("midpoint frame unavailable"));
        assert!(reframed.artifact.path.exists());
    }
}
