//! Motion stabilization.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use reelcut_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::quote_filter_path;
use crate::fs_utils::{partial_path, publish};

/// Produces a stabilized copy of a clip.
#[async_trait]
pub trait Stabilizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write a stabilized version of `input` to `output`. Scratch files go in `scratch`.
    async fn stabilize(
        &self,
        input: &Path,
        output: &Path,
        scratch: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<()>;
}

/// Two-pass libvidstab stabilization.
#[derive(Debug, Clone)]
pub struct VidStabStabilizer {
    pub shakiness: u8,
    pub accuracy: u8,
    pub smoothing: u32,
}

impl Default for VidStabStabilizer {
    fn default() -> Self {
        Self {
            shakiness: 5,
            accuracy: 15,
            smoothing: 30,
        }
    }
}

impl VidStabStabilizer {
    fn detect_filter(&self, transforms: &Path) -> String {
        format!(
            "vidstabdetect=shakiness={}:accuracy={}:result={}",
            self.shakiness,
            self.accuracy,
            quote_filter_path(transforms)
        )
    }

    fn transform_filter(&self, transforms: &Path) -> String {
        format!(
            "vidstabtransform=smoothing={}:input={}",
            self.smoothing,
            quote_filter_path(transforms)
        )
    }
}

#[async_trait]
impl Stabilizer for VidStabStabilizer {
    fn name(&self) -> &'static str {
        "vidstab"
    }

    async fn stabilize(
        &self,
        input: &Path,
        output: &Path,
        scratch: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<()> {
        let transforms = scratch.join("transforms.trf");

        let detect = FfmpegCommand::null_output()
            .input(input)
            .video_filter(self.detect_filter(&transforms));
        runner.run(&detect).await?;

        if !transforms.exists() {
            return Err(MediaError::ffmpeg_failed(
                "vidstabdetect produced no transform log",
                None,
                None,
            ));
        }
        debug!(transforms = %transforms.display(), "Motion analysis complete");

        let partial = partial_path(output);
        let transform = FfmpegCommand::new(input, &partial)
            .video_filter(self.transform_filter(&transforms))
            .map("0:v:0")
            .map("0:a:0?")
            .encoding(&EncodingConfig::for_intermediate());
        runner.run(&transform).await?;
        publish(&partial, output).await
    }
}
