//! Delivery profile and encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// H.264 profile and level for delivery
pub const DEFAULT_PROFILE: &str = "high";
pub const DEFAULT_LEVEL: &str = "4.1";

/// Fixed output geometry, frame rate and loudness targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryProfile;

impl DeliveryProfile {
    pub const WIDTH: u32 = 1080;
    pub const HEIGHT: u32 = 1920;
    pub const FPS: u32 = 30;
    pub const PIX_FMT: &'static str = "yuv420p";
    pub const AUDIO_RATE: u32 = 48_000;

    /// Integrated loudness target (LUFS)
    pub const LOUDNESS_I: f64 = -14.0;
    /// True peak ceiling (dBTP)
    pub const LOUDNESS_TP: f64 = -1.5;
    /// Loudness range (LU)
    pub const LOUDNESS_LRA: f64 = 11.0;

    /// `WIDTHxHEIGHT` for filter arguments.
    pub fn size() -> String {
        format!("{}x{}", Self::WIDTH, Self::HEIGHT)
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_level")]
    pub level: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            profile: default_profile(),
            level: default_level(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faster settings for intermediates that get re-encoded later.
    pub fn for_intermediate() -> Self {
        Self {
            preset: "veryfast".to_string(),
            crf: 16,
            ..Default::default()
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Video codec arguments (no audio).
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-profile:v".to_string(),
            self.profile.clone(),
            "-level".to_string(),
            self.level.clone(),
            "-pix_fmt".to_string(),
            DeliveryProfile::PIX_FMT.to_string(),
        ]
    }

    /// Audio codec arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        args.extend(self.extra_args.iter().cloned());
        args
    }
}
