//! Decoded frame access through FFmpeg.
//!
//! Frames are streamed as raw `rgb24` or `gray` bytes on stdout and read one
//! at a time, so memory stays bounded by a single frame regardless of source
//! length.

use image::{GrayImage, RgbImage};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tracing::debug;

use crate::command::{wait_cancelled, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{partial_path, publish};
use crate::probe::VideoInfo;

/// Raw pixel layout requested from FFmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Gray,
}

impl PixelFormat {
    fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Gray => "gray",
        }
    }

    fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray => 1,
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub index: u64,
    /// Seconds from the start of the source.
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn into_rgb(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }

    pub fn into_gray(self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data)
    }
}

/// Analysis size for a source: at most `max_width` wide, aspect kept, even dimensions.
pub fn analysis_size(source_width: u32, source_height: u32, max_width: u32) -> (u32, u32) {
    let width = source_width.min(max_width.max(2));
    let scale = width as f64 / source_width.max(1) as f64;
    let height = (source_height as f64 * scale).round() as u32;
    (even(width), even(height))
}

fn even(v: u32) -> u32 {
    (v.max(2) / 2) * 2
}

/// Sequential reader over downscaled raw frames of a source.
pub struct RawFrameStream {
    child: Child,
    stdout: BufReader<ChildStdout>,
    cancel_rx: Option<watch::Receiver<bool>>,
    width: u32,
    height: u32,
    frame_bytes: usize,
    fps: f64,
    next_index: u64,
}

impl RawFrameStream {
    /// Start decoding `path` at analysis resolution.
    ///
    /// `sample_fps` resamples the stream; `None` keeps the source rate.
    pub async fn open(
        path: &Path,
        info: &VideoInfo,
        max_width: u32,
        sample_fps: Option<f64>,
        format: PixelFormat,
        runner: &FfmpegRunner,
    ) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let (width, height) = analysis_size(info.width, info.height, max_width);
        let fps = sample_fps.filter(|f| *f > 0.0).unwrap_or(info.fps);

        let mut filters = Vec::new();
        if sample_fps.is_some() {
            filters.push(format!("fps={:.3}", fps));
        }
        filters.push(format!("scale={}:{}:flags=area", width, height));

        debug!(
            path = %path.display(),
            width,
            height,
            fps,
            "Opening raw frame stream"
        );

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(path)
            .args([
                "-an",
                "-sn",
                "-vf",
                &filters.join(","),
                "-pix_fmt",
                format.ffmpeg_name(),
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(1 << 20, stdout),
            cancel_rx: runner.cancel_signal(),
            width,
            height,
            frame_bytes: width as usize * height as usize * format.channels(),
            fps,
            next_index: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Read the next frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> MediaResult<Option<RawFrame>> {
        let mut data = vec![0u8; self.frame_bytes];
        let read = tokio::select! {
            r = self.stdout.read_exact(&mut data) => r,
            _ = wait_cancelled(self.cancel_rx.clone()) => {
                let _ = self.child.kill().await;
                return Err(MediaError::Cancelled);
            }
        };

        match read {
            Ok(_) => {
                let index = self.next_index;
                self.next_index += 1;
                Ok(Some(RawFrame {
                    index,
                    timestamp: index as f64 / self.fps,
                    width: self.width,
                    height: self.height,
                    data,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    /// Number of frames delivered so far.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }

    /// Wait for the decoder to exit; fails if it exited with an error.
    pub async fn finish(mut self) -> MediaResult<()> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "frame decoder exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// A still frame written to disk for subject detection.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Seconds from the start of the source.
    pub timestamp: f64,
}

/// Extract the frame at `timestamp` as a PNG at full source resolution.
pub async fn extract_frame(
    runner: &FfmpegRunner,
    source: &Path,
    timestamp: f64,
    output: &Path,
) -> MediaResult<SampledFrame> {
    let partial = partial_path(output);
    let cmd = FfmpegCommand::new(source, &partial)
        .seek(timestamp.max(0.0))
        .single_frame()
        .output_args(["-an", "-f", "image2", "-c:v", "png"]);

    runner.run(&cmd).await?;
    publish(&partial, output).await?;

    let (width, height) = image::image_dimensions(output)?;
    Ok(SampledFrame {
        path: output.to_path_buf(),
        width,
        height,
        timestamp,
    })
}
