//! End-to-end pipeline scenarios against generated sources.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;

use reelcut_media::{
    probe_video, FfmpegRunner, MediaError, MediaResult, ShotDetector, ShotParams, Stabilizer,
    VideoInfo,
};
use reelcut_models::{PipelineStage, Segment, StylePreset};
use reelcut_worker::{Capabilities, Pipeline, WorkerConfig};

const SHOT_COLORS: [&str; 12] = [
    "red", "blue", "white", "black", "green", "magenta", "yellow", "navy", "orange", "cyan",
    "maroon", "gray",
];

async fn ffmpeg(args: &[String]) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-v", "error"])
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .expect("Failed to spawn ffmpeg");
    assert!(status.success(), "ffmpeg failed: {:?}", args);
}

/// Single continuous shot with a tone.
async fn continuous_source(dir: &Path, seconds: u32) -> PathBuf {
    let path = dir.join("continuous.mp4");
    ffmpeg(&[
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("testsrc2=size=640x360:rate=30:duration={}", seconds),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("sine=frequency=440:duration={}", seconds),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        path.to_string_lossy().to_string(),
    ])
    .await;
    path
}

/// Hard cuts between flat colours, no audio track.
async fn cut_source(dir: &Path, shot_secs: u32) -> PathBuf {
    let path = dir.join("cuts.mp4");
    let mut graph = String::new();
    for (i, color) in SHOT_COLORS.iter().enumerate() {
        graph.push_str(&format!(
            "color=c={}:s=640x360:r=30:d={}[s{}];",
            color, shot_secs, i
        ));
    }
    for i in 0..SHOT_COLORS.len() {
        graph.push_str(&format!("[s{}]", i));
    }
    graph.push_str(&format!("concat=n={}:v=1:a=0[v]", SHOT_COLORS.len()));

    ffmpeg(&[
        "-filter_complex".into(),
        graph,
        "-map".into(),
        "[v]".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        path.to_string_lossy().to_string(),
    ])
    .await;
    path
}

/// Primary detector that never finds a shot.
struct BlindDetector;

#[async_trait]
impl ShotDetector for BlindDetector {
    fn name(&self) -> &'static str {
        "blind"
    }

    async fn detect(
        &self,
        _source: &Path,
        _info: &VideoInfo,
        _params: &ShotParams,
        _runner: &FfmpegRunner,
    ) -> MediaResult<Vec<Segment>> {
        Ok(Vec::new())
    }
}

/// Stabilizer whose transform pass always fails.
struct BrokenStabilizer;

#[async_trait]
impl Stabilizer for BrokenStabilizer {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn stabilize(
        &self,
        _input: &Path,
        _output: &Path,
        _scratch: &Path,
        _runner: &FfmpegRunner,
    ) -> MediaResult<()> {
        Err(MediaError::ffmpeg_failed(
            "vidstabdetect",
            Some("No such filter: 'vidstabdetect'".to_string()),
            Some(1),
        ))
    }
}

fn test_config(root: &Path) -> WorkerConfig {
    WorkerConfig {
        work_dir: root.join("work"),
        output_dir: root.join("out"),
        stabilize: false,
        lut_dir: None,
        selection_seed: Some(7),
        max_parallel_excerpts: 2,
        style: StylePreset::Warm,
        ..Default::default()
    }
}

async fn assert_portrait(path: &Path) -> f64 {
    let info = probe_video(path).await.expect("Failed to probe deliverable");
    assert_eq!((info.width, info.height), (1080, 1920));
    assert!((info.fps - 30.0).abs() < 0.5, "fps was {}", info.fps);
    assert!(info.has_audio);
    info.duration
}

/// A 45 second source is used whole and yields one deliverable.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_short_source_single_excerpt() {
    let dir = TempDir::new().unwrap();
    let source = continuous_source(dir.path(), 45).await;
    let config = test_config(dir.path());

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let summary = pipeline.run(&source).await.expect("Pipeline failed");

    assert_eq!(summary.segments.len(), 1);
    assert_eq!(summary.segments[0].start(), 0.0);
    assert!((summary.segments[0].end() - 45.0).abs() < 0.2);
    assert!(summary.deliverable.starts_with(dir.path().join("out")));
    assert_eq!(summary.stage_timings.len(), 6);
    assert_eq!(summary.stage_timings.last().unwrap().stage, PipelineStage::Rendering);

    let duration = assert_portrait(&summary.deliverable).await;
    assert!((duration - 45.0).abs() < 1.0, "duration was {}", duration);
}

/// Twelve hard cuts with four wanted yields four chronological excerpts
/// crossfaded together.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_many_shots_sampled_and_crossfaded() {
    let dir = TempDir::new().unwrap();
    let source = cut_source(dir.path(), 6).await;
    let config = WorkerConfig {
        desired_scenes: 4,
        ..test_config(dir.path())
    };

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let summary = pipeline.run(&source).await.expect("Pipeline failed");

    assert_eq!(summary.segments.len(), 4);
    assert!(summary
        .segments
        .windows(2)
        .all(|w| w[0].end() <= w[1].start()));

    let sum: f64 = summary.segments.iter().map(|s| s.duration()).sum();
    let expected = sum - 3.0 * summary.crossfade;
    assert!((summary.expected_duration - expected).abs() < 0.5);

    let duration = assert_portrait(&summary.deliverable).await;
    assert!(
        (duration - expected).abs() < 0.75,
        "duration {} expected {}",
        duration,
        expected
    );
}

/// An empty lookup table directory still produces a graded deliverable.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_missing_lut_still_renders() {
    let dir = TempDir::new().unwrap();
    let source = continuous_source(dir.path(), 20).await;
    let luts = dir.path().join("luts");
    std::fs::create_dir_all(&luts).unwrap();
    let config = WorkerConfig {
        lut_dir: Some(luts),
        stabilize: true,
        ..test_config(dir.path())
    };

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let summary = pipeline.run(&source).await.expect("Pipeline failed");

    assert!(summary.fallbacks_for("lut").count() >= 1);
    assert_portrait(&summary.deliverable).await;
}

/// A transcript path that does not exist yields uncaptioned output.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_missing_transcript_renders_without_captions() {
    let dir = TempDir::new().unwrap();
    let source = continuous_source(dir.path(), 15).await;
    let config = WorkerConfig {
        transcript_path: Some(dir.path().join("missing.srt")),
        ..test_config(dir.path())
    };

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let summary = pipeline.run(&source).await.expect("Pipeline failed");

    assert_eq!(summary.fallbacks_for("transcript").count(), 1);
    assert_eq!(summary.fallbacks_for("captions").count(), 0);
    assert_portrait(&summary.deliverable).await;
}

/// Captions from an SRT file and the preview label keep only the first excerpt.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_preview_with_captions() {
    let dir = TempDir::new().unwrap();
    let source = cut_source(dir.path(), 6).await;
    let srt = dir.path().join("talk.srt");
    std::fs::write(
        &srt,
        "1\n00:00:01,000 --> 00:00:03,000\nfirst line\n\n2\n00:00:40,000 --> 00:00:42,000\nlater line\n",
    )
    .unwrap();
    let config = WorkerConfig {
        transcript_path: Some(srt),
        ..test_config(dir.path())
    }
    .preview();

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let summary = pipeline.run(&source).await.expect("Pipeline failed");

    assert!(summary.preview);
    assert_eq!(summary.segments.len(), 1);
    assert_eq!(summary.fallbacks_for("transcript").count(), 0);
    assert_portrait(&summary.deliverable).await;
}

/// An unreadable source fails in the segmenting stage.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_unreadable_source_fails_segmenting() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("garbage.mp4");
    std::fs::write(&source, b"definitely not a video").unwrap();
    let config = test_config(dir.path());

    let pipeline = Pipeline::new(config.clone(), Capabilities::from_config(&config));
    let err = pipeline.run(&source).await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(PipelineStage::Segmenting));
    assert!(err.is_input_error());
}

/// An empty primary detection falls back to frame differencing, which still
/// finds the hard cuts.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_empty_primary_detection_uses_frame_difference() {
    let dir = TempDir::new().unwrap();
    let source = cut_source(dir.path(), 6).await;
    let config = WorkerConfig {
        desired_scenes: 4,
        ..test_config(dir.path())
    };
    let caps = Capabilities {
        shot_detector: Some(Arc::new(BlindDetector)),
        ..Capabilities::from_config(&config)
    };

    let summary = Pipeline::new(config, caps)
        .run(&source)
        .await
        .expect("Pipeline failed");

    assert_eq!(summary.fallbacks_for("shot_detector").count(), 1);
    assert_eq!(summary.fallbacks_for("selection").count(), 0);
    assert_eq!(summary.segments.len(), 4);
    assert_portrait(&summary.deliverable).await;
}

/// A single continuous shot with an empty primary detection is rendered
/// whole through the opening window.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_empty_detection_on_single_shot_renders_whole_source() {
    let dir = TempDir::new().unwrap();
    let source = continuous_source(dir.path(), 40).await;
    let config = test_config(dir.path());
    let caps = Capabilities {
        shot_detector: Some(Arc::new(BlindDetector)),
        ..Capabilities::from_config(&config)
    };

    let summary = Pipeline::new(config, caps)
        .run(&source)
        .await
        .expect("Pipeline failed");

    assert_eq!(summary.fallbacks_for("shot_detector").count(), 1);
    assert!(summary.deliverable.exists());
    let duration = assert_portrait(&summary.deliverable).await;
    assert!((duration - 40.0).abs() < 1.0, "duration was {}", duration);
}

/// A stabilizer that fails leaves the excerpt unstabilized but rendered.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_stabilizer_failure_does_not_abort() {
    let dir = TempDir::new().unwrap();
    let source = continuous_source(dir.path(), 20).await;
    let config = WorkerConfig {
        stabilize: true,
        ..test_config(dir.path())
    };
    let caps = Capabilities {
        stabilizer: Some(Arc::new(BrokenStabilizer)),
        ..Capabilities::from_config(&config)
    };

    let summary = Pipeline::new(config, caps)
        .run(&source)
        .await
        .expect("Pipeline failed");

    assert_eq!(summary.fallbacks_for("stabilizer").count(), summary.segments.len());
    assert!(summary.deliverable.exists());
    let duration = assert_portrait(&summary.deliverable).await;
    assert!((duration - 20.0).abs() < 1.0, "duration was {}", duration);
}
