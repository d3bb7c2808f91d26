//! Caption burn-in and the preview label.

pub mod source;

pub use source::{SrtFileSource, TranscriptSource, WhisperCliTranscriber};

use std::path::Path;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{info, warn};

use reelcut_models::{EncodingConfig, PipelineArtifact, Segment, Transcript};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{escape_drawtext, quote_filter_path};
use crate::fs_utils::{partial_path, publish};
use crate::metrics::{record_fallback, record_ffmpeg_duration};

/// Text of the preview label.
pub const PREVIEW_LABEL: &str = "preview only";

/// Caption appearance, rendered through libass `force_style`.
#[derive(Debug, Clone)]
pub struct CaptionStyle {
    pub font: String,
    pub font_size: u32,
    pub outline: u32,
    pub margin_v: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 14,
            outline: 2,
            margin_v: 60,
        }
    }
}

impl CaptionStyle {
    /// Bottom-centre, white text with a black outline.
    fn force_style(&self) -> String {
        format!(
            "Alignment=2,FontName={},FontSize={},PrimaryColour=&H00FFFFFF,\
             OutlineColour=&H00000000,BorderStyle=1,Outline={},Shadow=0,MarginV={}",
            self.font, self.font_size, self.outline, self.margin_v
        )
    }

    fn subtitles_filter(&self, srt: &Path) -> String {
        format!(
            "subtitles=filename={}:force_style='{}'",
            quote_filter_path(srt),
            self.force_style()
        )
    }
}

/// Small semi-transparent label in the top-right corner.
pub fn preview_label_filter() -> String {
    format!(
        "drawtext=text='{}':fontcolor=white@0.85:fontsize=36:box=1:boxcolor=black@0.4:boxborderw=10:x=w-tw-32:y=32",
        escape_drawtext(PREVIEW_LABEL)
    )
}

/// Outcome of captioning one clip.
#[derive(Debug, Clone)]
pub struct Captioned {
    pub artifact: PipelineArtifact,
    /// Number of cues burned in.
    pub cues: usize,
    /// Why captions were not rendered, when a transcript was expected.
    pub skipped: Option<String>,
}

/// Burns the excerpt's transcript slice into the clip.
pub struct CaptionCompositor {
    runner: FfmpegRunner,
    style: CaptionStyle,
    encoding: EncodingConfig,
}

impl CaptionCompositor {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            style: CaptionStyle::default(),
            encoding: EncodingConfig::for_intermediate(),
        }
    }

    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Caption `clip`, whose content is `segment` of the source.
    ///
    /// Without a transcript, or if burning fails, the clip is passed through
    /// uncaptioned with a warning.
    pub async fn overlay(
        &self,
        clip: &PipelineArtifact,
        segment: &Segment,
        transcript: Option<&Transcript>,
        preview: bool,
        work_dir: &Path,
    ) -> MediaResult<Captioned> {
        let index = clip.index;
        let scratch = TempDir::new_in(work_dir)?;
        let output = work_dir.join(format!("captioned_{:02}.mp4", index));

        let mut skipped = None;
        let slice = match transcript {
            Some(t) => t.slice(segment),
            None => {
                warn!(excerpt = index, "Transcript unavailable, skipping captions");
                skipped = Some("transcript unavailable".to_string());
                Transcript::default()
            }
        };

        let srt = if slice.is_empty() {
            None
        } else {
            let path = scratch.path().join(format!("captions_{:02}.srt", index));
            tokio::fs::write(&path, slice.to_srt()).await?;
            Some(path)
        };

        let started = Instant::now();
        let cues = match self.render(clip, srt.as_deref(), preview, &output).await {
            Ok(()) => slice.len(),
            Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
            Err(e) if srt.is_some() => {
                warn!(excerpt = index, error = %e, "Caption burn-in failed, retrying without captions");
                record_fallback("captions");
                skipped = Some(format!("burn-in failed: {}", e));
                self.render(clip, None, preview, &output).await?;
                0
            }
            Err(e) => return Err(e),
        };
        record_ffmpeg_duration("captions", started.elapsed().as_secs_f64());

        info!(excerpt = index, cues, preview, "Captioned excerpt");
        Ok(Captioned {
            artifact: PipelineArtifact::new(output, index),
            cues,
            skipped,
        })
    }

    async fn render(
        &self,
        clip: &PipelineArtifact,
        srt: Option<&Path>,
        preview: bool,
        output: &Path,
    ) -> MediaResult<()> {
        let mut filters = Vec::new();
        if let Some(srt) = srt {
            filters.push(self.style.subtitles_filter(srt));
        }
        if preview {
            filters.push(preview_label_filter());
        }

        let partial = partial_path(output);
        let cmd = FfmpegCommand::new(&clip.path, &partial)
            .map("0:v:0")
            .map("0:a:0?");
        let cmd = if filters.is_empty() {
            cmd.output_args(["-c", "copy"])
        } else {
            cmd.video_filter(filters.join(",")).encoding(&self.encoding)
        };

        self.runner.run(&cmd).await?;
        publish(&partial, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitles_filter_is_bottom_centre() {
        let filter = CaptionStyle::default().subtitles_filter(Path::new("/w/c.srt"));
        assert!(filter.starts_with("subtitles=filename='/w/c.srt':force_style='Alignment=2,"));
        assert!(filter.ends_with("MarginV=60'"));
    }

    #[test]
    fn test_preview_label_top_right() {
        let label = preview_label_filter();
        assert!(label.contains("text='preview only'"));
        assert!(label.contains("x=w-tw-32"));
        assert!(label.contains("boxcolor=black@0.4"));
    }
}
