//! Subject detection on sampled frames.

use async_trait::async_trait;

use reelcut_models::SubjectBox;

use crate::error::MediaResult;
use crate::frames::SampledFrame;

/// Locates salient subjects (typically faces) in a still frame.
#[async_trait]
pub trait SubjectDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Boxes in the frame's pixel coordinates. An empty list means no subject.
    async fn detect(&self, frame: &SampledFrame) -> MediaResult<Vec<SubjectBox>>;
}

#[cfg(feature = "opencv")]
pub use yunet::YuNetSubjectDetector;

#[cfg(feature = "opencv")]
mod yunet {
    use async_trait::async_trait;
    use opencv::core::{Mat, Ptr, Size};
    use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_BACKEND_OPENCV, DNN_TARGET_CPU};
    use opencv::imgcodecs;
    use opencv::imgproc;
    use opencv::objdetect::FaceDetectorYN;
    use opencv::prelude::*;
    use std::path::{Path, PathBuf};
    use tracing::{debug, warn};

    use reelcut_models::SubjectBox;

    use super::SubjectDetector;
    use crate::error::{MediaError, MediaResult};
    use crate::frames::SampledFrame;

    /// Minimum detection confidence
    const SCORE_THRESHOLD: f32 = 0.6;
    /// Non-maximum suppression threshold
    const NMS_THRESHOLD: f32 = 0.3;
    /// Top K faces to keep
    const TOP_K: i32 = 10;

    /// Face detector backed by OpenCV's YuNet model.
    pub struct YuNetSubjectDetector {
        model_path: PathBuf,
    }

    impl YuNetSubjectDetector {
        /// Validate the model file and build the detector.
        pub fn new(model_path: impl AsRef<Path>) -> MediaResult<Self> {
            let model_path = model_path.as_ref();
            let meta = std::fs::metadata(model_path)
                .map_err(|_| MediaError::model_not_found(model_path.display().to_string()))?;
            if meta.len() < 50_000 {
                return Err(MediaError::detection_failed(format!(
                    "YuNet model file appears corrupted (size: {} bytes)",
                    meta.len()
                )));
            }
            Ok(Self {
                model_path: model_path.to_path_buf(),
            })
        }
    }

    #[async_trait]
    impl SubjectDetector for YuNetSubjectDetector {
        fn name(&self) -> &'static str {
            "yunet"
        }

        async fn detect(&self, frame: &SampledFrame) -> MediaResult<Vec<SubjectBox>> {
            let model = self.model_path.clone();
            let image = frame.path.clone();
            tokio::task::spawn_blocking(move || detect_blocking(&model, &image))
                .await
                .map_err(|e| MediaError::internal(format!("detector task failed: {}", e)))?
        }
    }

    /// YuNet works best with inputs that are multiples of 32 and no larger than 960x540.
    fn input_size(frame_width: i32, frame_height: i32) -> (i32, i32) {
        let scale = (frame_width as f64 / 960.0)
            .max(frame_height as f64 / 540.0)
            .max(1.0);
        const ALIGNMENT: i32 = 32;
        let align = |v: f64| (((v.round() as i32) + ALIGNMENT / 2) / ALIGNMENT) * ALIGNMENT;
        (
            align(frame_width as f64 / scale).clamp(160, 960),
            align(frame_height as f64 / scale).clamp(120, 540),
        )
    }

    fn create_detector(model: &Path, size: (i32, i32)) -> MediaResult<Ptr<FaceDetectorYN>> {
        let model = model.to_string_lossy();
        let mut last_error = String::new();
        for (backend, target) in [
            (DNN_BACKEND_DEFAULT, DNN_TARGET_CPU),
            (DNN_BACKEND_OPENCV, DNN_TARGET_CPU),
        ] {
            match FaceDetectorYN::create(
                &model,
                "",
                Size::new(size.0, size.1),
                SCORE_THRESHOLD,
                NMS_THRESHOLD,
                TOP_K,
                backend,
                target,
            ) {
                Ok(detector) => return Ok(detector),
                Err(e) => {
                    warn!("YuNet backend {} failed: {}", backend, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(MediaError::detection_failed(format!(
            "Failed to create YuNet detector: {}",
            last_error
        )))
    }

    fn detect_blocking(model: &Path, image_path: &Path) -> MediaResult<Vec<SubjectBox>> {
        let frame = imgcodecs::imread(&image_path.to_string_lossy(), imgcodecs::IMREAD_COLOR)
            .map_err(|e| MediaError::detection_failed(format!("imread failed: {}", e)))?;
        if frame.empty() {
            return Err(MediaError::detection_failed("sampled frame could not be decoded"));
        }

        let (frame_w, frame_h) = (frame.cols(), frame.rows());
        let (in_w, in_h) = input_size(frame_w, frame_h);
        let mut detector = create_detector(model, (in_w, in_h))?;

        let mut resized = Mat::default();
        imgproc::resize(
            &frame,
            &mut resized,
            Size::new(in_w, in_h),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| MediaError::detection_failed(format!("resize failed: {}", e)))?;

        let mut faces = Mat::default();
        detector
            .detect(&resized, &mut faces)
            .map_err(|e| MediaError::detection_failed(format!("YuNet detection failed: {}", e)))?;

        // Rows: [x, y, w, h, 10 landmark coords, score]
        let scale_x = frame_w as f64 / in_w as f64;
        let scale_y = frame_h as f64 / in_h as f64;
        let mut boxes = Vec::new();
        for i in 0..faces.rows() {
            let cell = |c: i32| faces.at_2d::<f32>(i, c).map(|v| *v as f64).ok();
            let (Some(x), Some(y), Some(w), Some(h), Some(score)) =
                (cell(0), cell(1), cell(2), cell(3), cell(14))
            else {
                continue;
            };
            let x0 = (x * scale_x).max(0.0);
            let y0 = (y * scale_y).max(0.0);
            let x1 = ((x + w) * scale_x).min(frame_w as f64);
            let y1 = ((y + h) * scale_y).min(frame_h as f64);
            if x1 > x0 && y1 > y0 && score >= SCORE_THRESHOLD as f64 {
                boxes.push(SubjectBox::new(x0, y0, x1 - x0, y1 - y0, score));
            }
        }

        debug!(faces = boxes.len(), "YuNet detection finished");
        Ok(boxes)
    }

}
