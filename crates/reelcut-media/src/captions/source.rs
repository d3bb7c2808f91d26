//! Transcript sources.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use reelcut_models::Transcript;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Provides a timed transcript for the whole source.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcript(
        &self,
        source: &Path,
        work_dir: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<Transcript>;
}

/// Reads an existing `.srt` file.
#[derive(Debug, Clone)]
pub struct SrtFileSource {
    path: PathBuf,
}

impl SrtFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TranscriptSource for SrtFileSource {
    fn name(&self) -> &'static str {
        "srt_file"
    }

    async fn transcript(
        &self,
        _source: &Path,
        _work_dir: &Path,
        _runner: &FfmpegRunner,
    ) -> MediaResult<Transcript> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::FileNotFound(self.path.clone())
            } else {
                MediaError::Io(e)
            }
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let transcript = Transcript::from_srt(&text)?;
        debug!(path = %self.path.display(), cues = transcript.len(), "Loaded SRT transcript");
        Ok(transcript)
    }
}

/// Runs a local whisper command line tool that writes SRT.
///
/// The audio track is first extracted to 16 kHz mono WAV, then
/// `<binary> <wav> --model <model> --output_format srt --output_dir <dir>`
/// is expected to produce `<dir>/<wav stem>.srt`.
#[derive(Debug, Clone)]
pub struct WhisperCliTranscriber {
    binary: PathBuf,
    model: String,
    language: Option<String>,
}

impl WhisperCliTranscriber {
    /// Locate `binary_name` on PATH.
    pub fn locate(binary_name: &str, model: impl Into<String>) -> MediaResult<Self> {
        let binary = which::which(binary_name).map_err(|_| {
            MediaError::capability_unavailable(format!("{} not found in PATH", binary_name))
        })?;
        Ok(Self {
            binary,
            model: model.into(),
            language: None,
        })
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    fn args(&self, audio: &Path, out_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio.to_string_lossy().to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "srt".to_string(),
            "--output_dir".to_string(),
            out_dir.to_string_lossy().to_string(),
        ];
        if let Some(lang) = &self.language {
            args.push("--language".to_string());
            args.push(lang.clone());
        }
        args
    }
}

#[async_trait]
impl TranscriptSource for WhisperCliTranscriber {
    fn name(&self) -> &'static str {
        "whisper_cli"
    }

    async fn transcript(
        &self,
        source: &Path,
        work_dir: &Path,
        runner: &FfmpegRunner,
    ) -> MediaResult<Transcript> {
        let scratch = TempDir::new_in(work_dir)?;
        let audio = scratch.path().join("speech.wav");

        let extract = FfmpegCommand::new(source, &audio)
            .output_args(["-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"]);
        runner.run(&extract).await?;

        info!(model = %self.model, "Transcribing audio");
        let mut child = Command::new(&self.binary)
            .args(self.args(&audio, scratch.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let status = runner.wait_for_completion(&mut child).await?;
        if !status.success() {
            return Err(MediaError::capability_unavailable(format!(
                "whisper exited with status {:?}",
                status.code()
            )));
        }

        let srt = scratch.path().join("speech.srt");
        let text = tokio::fs::read_to_string(&srt).await.map_err(|_| {
            MediaError::capability_unavailable("whisper produced no SRT output")
        })?;
        Ok(Transcript::from_srt(&text)?)
    }
}
