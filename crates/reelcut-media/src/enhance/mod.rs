//! Stylized visual treatment with optional stabilization.

mod filters;
mod lut;
mod stabilize;

pub use filters::{eq_filter, enhance_graph};
pub use lut::LutLibrary;
pub use stabilize::{Stabilizer, VidStabStabilizer};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{info, warn};

use reelcut_models::{EncodingConfig, PipelineArtifact, StylePreset};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{partial_path, publish};
use crate::metrics::{record_fallback, record_ffmpeg_duration};

/// Outcome of enhancing one clip.
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub artifact: PipelineArtifact,
    pub lut: Option<PathBuf>,
    pub stabilized: bool,
    /// Optional steps that were skipped, with the reason.
    pub skipped: Vec<(&'static str, String)>,
}

/// Applies grade, lookup table, sharpening, vignette, grain and bloom.
pub struct Enhancer {
    stabilizer: Option<Arc<dyn Stabilizer>>,
    luts: Option<LutLibrary>,
    rng: Mutex<StdRng>,
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl Enhancer {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            stabilizer: None,
            luts: None,
            rng: Mutex::new(StdRng::from_os_rng()),
            runner,
            encoding: EncodingConfig::for_intermediate(),
        }
    }

    pub fn with_stabilizer(mut self, stabilizer: Option<Arc<dyn Stabilizer>>) -> Self {
        self.stabilizer = stabilizer;
        self
    }

    pub fn with_luts(mut self, luts: Option<LutLibrary>) -> Self {
        self.luts = luts;
        self
    }

    /// Random source for lookup table selection.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    fn pick_lut(&self, preset: StylePreset) -> Option<PathBuf> {
        let luts = self.luts.as_ref()?;
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        luts.select(preset, &mut *rng)
    }

    /// Enhance `clip` into a new artifact in `work_dir`.
    pub async fn enhance(
        &self,
        clip: &PipelineArtifact,
        preset: StylePreset,
        work_dir: &Path,
    ) -> MediaResult<Enhanced> {
        let index = clip.index;
        let scratch = TempDir::new_in(work_dir)?;
        let mut skipped = Vec::new();

        let mut input = clip.path.clone();
        let mut stabilized = false;
        if let Some(stabilizer) = &self.stabilizer {
            let stable = scratch.path().join(format!("stable_{:02}.mp4", index));
            match stabilizer
                .stabilize(&clip.path, &stable, scratch.path(), &self.runner)
                .await
            {
                Ok(()) => {
                    input = stable;
                    stabilized = true;
                }
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => {
                    warn!(
                        excerpt = index,
                        stabilizer = stabilizer.name(),
                        error = %e,
                        "Stabilization failed, continuing unstabilized"
                    );
                    record_fallback("stabilizer");
                    skipped.push(("stabilizer", e.to_string()));
                }
            }
        }

        let lut = self.pick_lut(preset);
        if lut.is_none() {
            warn!(excerpt = index, "No lookup table available, continuing without LUT");
            record_fallback("lut");
            skipped.push(("lut", "no .cube table found".to_string()));
        }

        let output = work_dir.join(format!("enhanced_{:02}.mp4", index));
        let partial = partial_path(&output);
        let cmd = FfmpegCommand::new(&input, &partial)
            .filter_complex(enhance_graph(&preset.grade(), lut.as_deref()))
            .map("[v]")
            .map("0:a:0?")
            .encoding(&self.encoding);

        let started = Instant::now();
        self.runner.run(&cmd).await?;
        publish(&partial, &output).await?;
        record_ffmpeg_duration("enhance", started.elapsed().as_secs_f64());

        info!(
            excerpt = index,
            style = %preset,
            stabilized,
            lut = ?lut.as_ref().and_then(|p| p.file_name()),
            "Enhanced excerpt"
        );

        Ok(Enhanced {
            artifact: PipelineArtifact::new(output, index),
            lut,
            stabilized,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pick_lut_without_library() {
        let enhancer = Enhancer::new(FfmpegRunner::new());
        assert!(enhancer.pick_lut(StylePreset::Warm).is_none());
    }

    #[test]
    fn test_pick_lut_is_reproducible_with_seed() {
        let dir = TempDir::new().unwrap();
        for name in ["a.cube", "b.cube", "c.cube", "d.cube"] {
            std::fs::write(dir.path().join(name), b"LUT_3D_SIZE 2\n").unwrap();
        }
        let build = || {
            Enhancer::new(FfmpegRunner::new())
                .with_luts(Some(LutLibrary::new(dir.path())))
                .with_rng(StdRng::seed_from_u64(42))
        };
        let first: Vec<_> = (0..3).map(|_| build().pick_lut(StylePreset::Random)).collect();
        let second: Vec<_> = (0..3).map(|_| build().pick_lut(StylePreset::Random)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(Option::is_some));
    }
}
