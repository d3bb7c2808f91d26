//! Final assembly: crossfaded concatenation and loudness normalization.

mod filters;

pub use filters::{concat_graph, effective_crossfade, expected_duration, FADE_OUT_SECS};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use reelcut_models::{DeliveryProfile, EncodingConfig, PipelineArtifact};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{partial_path, publish};
use crate::metrics::{record_fallback, record_ffmpeg_duration};
use crate::probe::probe_video;
use crate::progress::step_logger;

/// Default crossfade between consecutive clips, in seconds.
pub const DEFAULT_CROSSFADE_SECS: f64 = 0.4;

/// Result of a render.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// The deliverable: the normalized file, or the pre-normalization file
    /// when the loudness pass failed.
    pub path: PathBuf,
    pub normalized: bool,
    pub pre_normalized: PathBuf,
    /// Crossfade actually applied after clamping.
    pub crossfade: f64,
    pub expected_duration: f64,
}

/// `final_<YYYYmmdd_HHMMSS>_<8 hex>` stem for output files.
pub fn output_stem() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("final_{}_{}", stamp, &id[..8])
}

/// `loudnorm` filter for the delivery loudness target.
pub fn loudnorm_filter() -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        DeliveryProfile::LOUDNESS_I,
        DeliveryProfile::LOUDNESS_TP,
        DeliveryProfile::LOUDNESS_LRA
    )
}

/// Joins composited clips into the deliverable.
pub struct Assembler {
    runner: FfmpegRunner,
    crossfade: f64,
    encoding: EncodingConfig,
}

impl Assembler {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            crossfade: DEFAULT_CROSSFADE_SECS,
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_crossfade(mut self, secs: f64) -> Self {
        self.crossfade = secs.max(0.0);
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Render `clips` in the given order into `output_dir`.
    pub async fn render(
        &self,
        clips: &[PipelineArtifact],
        output_dir: &Path,
    ) -> MediaResult<Rendered> {
        if clips.is_empty() {
            return Err(MediaError::internal("no clips to assemble"));
        }

        let mut durations = Vec::with_capacity(clips.len());
        let mut has_audio = Vec::with_capacity(clips.len());
        for clip in clips {
            let info = probe_video(&clip.path).await?;
            durations.push(info.duration);
            has_audio.push(info.has_audio);
        }

        let crossfade = effective_crossfade(self.crossfade, &durations);
        if crossfade < self.crossfade {
            warn!(
                requested = self.crossfade,
                applied = crossfade,
                "Crossfade clamped to half the shortest clip"
            );
        }
        let expected = expected_duration(&durations, crossfade);

        let stem = output_stem();
        let concatenated = output_dir.join(format!("{}.mp4", stem));
        let normalized = output_dir.join(format!("{}_ln.mp4", stem));

        let started = Instant::now();
        self.concatenate(clips, &durations, &has_audio, crossfade, expected, &concatenated)
            .await?;
        record_ffmpeg_duration("assemble", started.elapsed().as_secs_f64());
        info!(
            clips = clips.len(),
            crossfade,
            expected_duration = expected,
            path = %concatenated.display(),
            "Assembled clips"
        );

        let started = Instant::now();
        let outcome = self.normalize(&concatenated, expected, &normalized).await;
        if outcome.is_ok() {
            record_ffmpeg_duration("loudnorm", started.elapsed().as_secs_f64());
        }
        let (path, is_normalized) = pick_deliverable(outcome, normalized, &concatenated)?;

        Ok(Rendered {
            path,
            normalized: is_normalized,
            pre_normalized: concatenated,
            crossfade,
            expected_duration: expected,
        })
    }

    async fn concatenate(
        &self,
        clips: &[PipelineArtifact],
        durations: &[f64],
        has_audio: &[bool],
        crossfade: f64,
        expected: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let partial = partial_path(output);
        let mut cmd = FfmpegCommand::to_output(&partial);
        for clip in clips {
            cmd = cmd.input(&clip.path);
        }
        if has_audio.iter().any(|a| !a) {
            cmd = cmd.lavfi(format!(
                "anullsrc=r={}:cl=stereo",
                DeliveryProfile::AUDIO_RATE
            ));
        }

        let cmd = cmd
            .filter_complex(concat_graph(durations, has_audio, crossfade, clips.len()))
            .map("[vout]")
            .map("[aout]")
            .output_arg("-r")
            .output_arg(DeliveryProfile::FPS.to_string())
            .output_arg("-ar")
            .output_arg(DeliveryProfile::AUDIO_RATE.to_string())
            .encoding(&self.encoding);

        self.runner
            .run_with_progress(&cmd, step_logger("assemble", expected, 10))
            .await?;
        publish(&partial, output).await
    }

    async fn normalize(&self, input: &Path, expected: f64, output: &Path) -> MediaResult<()> {
        let partial = partial_path(output);
        let cmd = FfmpegCommand::new(input, &partial)
            .map("0:v:0")
            .map("0:a:0")
            .output_arg("-af")
            .output_arg(loudnorm_filter())
            .video_codec("copy")
            .output_arg("-ar")
            .output_arg(DeliveryProfile::AUDIO_RATE.to_string())
            .output_args(self.encoding.audio_args())
            .output_args(["-movflags", "+faststart"]);

        self.runner
            .run_with_progress(&cmd, step_logger("loudnorm", expected, 25))
            .await?;
        publish(&partial, output).await
    }
}

/// The normalized file when loudnorm succeeded, otherwise the concatenated
/// render. Only cancellation is an error.
fn pick_deliverable(
    outcome: MediaResult<()>,
    normalized: PathBuf,
    pre_normalized: &Path,
) -> MediaResult<(PathBuf, bool)> {
    match outcome {
        Ok(()) => Ok((normalized, true)),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, "Loudness normalization failed, keeping unnormalized render");
            record_fallback("loudnorm");
            Ok((pre_normalized.to_path_buf(), false))
        }
    }
}
