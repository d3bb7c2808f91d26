//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reelcut_media::segmenter::{DEFAULT_MIN_LEN, DEFAULT_THRESHOLD};
use reelcut_media::DEFAULT_CROSSFADE_SECS;
use reelcut_models::StylePreset;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch directory for per-run intermediates
    pub work_dir: PathBuf,
    /// Where final renders are written
    pub output_dir: PathBuf,
    /// Number of excerpts to keep when more are detected
    pub desired_scenes: usize,
    /// Shot boundary sensitivity
    pub threshold: f64,
    /// Minimum shot length in seconds
    pub min_scene_len: f64,
    /// Visual style preset
    pub style: StylePreset,
    /// Render only the first excerpt, watermarked
    pub preview: bool,
    /// Run the two-pass stabilizer before grading
    pub stabilize: bool,
    /// Directory of `.cube` lookup tables
    pub lut_dir: Option<PathBuf>,
    /// Existing `.srt` transcript for the source
    pub transcript_path: Option<PathBuf>,
    /// Whisper model name; enables local transcription when set
    pub whisper_model: Option<String>,
    /// Whisper executable looked up on PATH
    pub whisper_binary: String,
    /// YuNet ONNX model for subject detection
    pub face_model_path: Option<PathBuf>,
    /// Maximum excerpts processed concurrently within a stage
    pub max_parallel_excerpts: usize,
    /// Crossfade between clips in seconds
    pub crossfade_secs: f64,
    /// Seed for scene selection and LUT choice; random when unset
    pub selection_seed: Option<u64>,
    /// Window used when no shots are detected
    pub fallback_window_secs: f64,
    /// Per-FFmpeg-invocation timeout
    pub ffmpeg_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelcut"),
            output_dir: PathBuf::from("output"),
            desired_scenes: 4,
            threshold: DEFAULT_THRESHOLD,
            min_scene_len: DEFAULT_MIN_LEN,
            style: StylePreset::Cinematic,
            preview: false,
            stabilize: true,
            lut_dir: Some(PathBuf::from("assets/luts")),
            transcript_path: None,
            whisper_model: None,
            whisper_binary: "whisper".to_string(),
            face_model_path: None,
            max_parallel_excerpts: 2,
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
            selection_seed: None,
            fallback_window_secs: 60.0,
            ffmpeg_timeout: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: env_path("REELCUT_WORK_DIR").unwrap_or(defaults.work_dir),
            output_dir: env_path("REELCUT_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            desired_scenes: env_parse("REELCUT_DESIRED_SCENES")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.desired_scenes),
            threshold: env_parse("REELCUT_THRESHOLD").unwrap_or(defaults.threshold),
            min_scene_len: env_parse("REELCUT_MIN_SCENE_LEN").unwrap_or(defaults.min_scene_len),
            style: std::env::var("REELCUT_STYLE")
                .map(|s| StylePreset::resolve(&s))
                .unwrap_or(defaults.style),
            preview: env_flag("REELCUT_PREVIEW").unwrap_or(defaults.preview),
            stabilize: env_flag("REELCUT_STABILIZE").unwrap_or(defaults.stabilize),
            lut_dir: env_path("REELCUT_LUT_DIR").or(defaults.lut_dir),
            transcript_path: env_path("REELCUT_TRANSCRIPT"),
            whisper_model: std::env::var("REELCUT_WHISPER_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            whisper_binary: std::env::var("REELCUT_WHISPER_BIN")
                .unwrap_or(defaults.whisper_binary),
            face_model_path: env_path("REELCUT_FACE_MODEL"),
            max_parallel_excerpts: env_parse("REELCUT_MAX_PARALLEL")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_parallel_excerpts),
            crossfade_secs: env_parse("REELCUT_CROSSFADE_SECS").unwrap_or(defaults.crossfade_secs),
            selection_seed: env_parse("REELCUT_SEED"),
            fallback_window_secs: env_parse("REELCUT_FALLBACK_WINDOW_SECS")
                .unwrap_or(defaults.fallback_window_secs),
            ffmpeg_timeout: match env_parse::<u64>("REELCUT_FFMPEG_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.ffmpeg_timeout,
            },
        }
    }

    /// Configuration for a quick watermarked preview of the first excerpt.
    pub fn preview(mut self) -> Self {
        self.preview = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.desired_scenes, 4);
        assert_eq!(config.threshold, 27.0);
        assert_eq!(config.min_scene_len, 1.0);
        assert_eq!(config.style, StylePreset::Cinematic);
        assert_eq!(config.crossfade_secs, 0.4);
        assert_eq!(config.fallback_window_secs, 60.0);
        assert!(!config.preview);
        assert!(config.preview().preview);
    }

    #[test]
    fn test_env_helpers_ignore_garbage() {
        std::env::set_var("REELCUT_TEST_GARBAGE_NUMBER", "not-a-number");
        assert_eq!(env_parse::<usize>("REELCUT_TEST_GARBAGE_NUMBER"), None);
        std::env::set_var("REELCUT_TEST_FLAG", "Yes");
        assert_eq!(env_flag("REELCUT_TEST_FLAG"), Some(true));
        std::env::set_var("REELCUT_TEST_FLAG", "off");
        assert_eq!(env_flag("REELCUT_TEST_FLAG"), Some(false));
        std::env::set_var("REELCUT_TEST_EMPTY_PATH", "  ");
        assert_eq!(env_path("REELCUT_TEST_EMPTY_PATH"), None);
    }
}
