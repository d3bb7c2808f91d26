//! Stream facts read from ffprobe.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

const PROBE_ARGS: [&str; 6] = [
    "-v",
    "error",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

/// Frame rate assumed when the container reports none.
const FALLBACK_FPS: f64 = 30.0;

/// What the pipeline needs to know about a source or an intermediate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Seconds, always positive.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: Option<ProbeContainer>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeContainer {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

impl ProbeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type == kind
    }

    fn fps(&self) -> Option<f64> {
        self.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| self.r_frame_rate.as_deref().and_then(parse_frame_rate))
    }
}

/// Probe a media file.
///
/// Anything ffprobe cannot make sense of is reported as an input error, so
/// callers can tell a bad source apart from a broken toolchain.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args(PROBE_ARGS)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => "ffprobe could not read the file",
            msg => msg,
        };
        return Err(MediaError::input_unreadable(path, reason));
    }

    let report: ProbeReport = serde_json::from_slice(&output.stdout).map_err(|e| {
        MediaError::input_unreadable(path, format!("unparseable probe output: {e}"))
    })?;
    summarize(path, report)
}

fn summarize(path: &Path, report: ProbeReport) -> MediaResult<VideoInfo> {
    let unreadable = |reason: &str| MediaError::input_unreadable(path, reason);

    let video = report
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or_else(|| unreadable("no video stream found"))?;

    let duration = report
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| unreadable("unknown or zero duration"))?;

    let (width, height) = video
        .width
        .zip(video.height)
        .filter(|&(w, h)| w > 0 && h > 0)
        .ok_or_else(|| unreadable("video stream has no dimensions"))?;

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps: video.fps().unwrap_or(FALLBACK_FPS),
        codec: video.codec_name.clone().unwrap_or_default(),
        has_audio: report.streams.iter().any(|s| s.is("audio")),
    })
}

/// `30000/1001` or `29.97`; zero and malformed rates yield `None`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => s.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_summarize_detects_audio() {
        let json = r#"{
            "format": {"duration": "12.5"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "avg_frame_rate": "25/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let report: ProbeReport = serde_json::from_str(json).unwrap();
        let info = summarize(Path::new("x.mp4"), report).unwrap();
        assert!(info.has_audio);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 25.0).abs() < 1e-9);
        assert!((info.duration - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_audio_only_is_input_error() {
        let json = r#"{"format": {"duration": "3.0"}, "streams": [{"codec_type": "audio"}]}"#;
        let report: ProbeReport = serde_json::from_str(json).unwrap();
        let err = summarize(Path::new("a.wav"), report).unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = probe_video("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
