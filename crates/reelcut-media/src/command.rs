//! Building and running FFmpeg invocations.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use reelcut_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, FfmpegProgress};

/// Lines of non-progress stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    source: String,
}

/// One FFmpeg invocation: any number of inputs and a single output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::to_output(output).input(input)
    }

    /// Create a command with no inputs yet.
    pub fn to_output(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create an analysis-only command whose output is discarded.
    pub fn null_output() -> Self {
        Self::to_output("-").output_args(["-f", "null"])
    }

    /// Append a file input.
    pub fn input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            source: input.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Append a lavfi source such as `anullsrc=r=48000:cl=stereo`.
    pub fn lavfi(mut self, graph: impl Into<String>) -> Self {
        self.inputs.push(FfmpegInput {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: graph.into(),
        });
        self
    }

    /// Add an argument placed before the most recently added `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(last) = self.inputs.last_mut() {
            last.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek the most recent input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit how much of the most recent input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Apply codec, quality and container settings.
    pub fn encoding(self, config: &EncodingConfig) -> Self {
        self.output_args(config.to_ffmpeg_args())
    }

    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Whether the output is a real file rather than a pipe or null sink.
    pub fn writes_file(&self) -> bool {
        self.output != Path::new("-")
    }

    /// Full argument list, without the program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Executes commands, honouring the run's cancel signal and time budget.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Kill the process after `secs` and report a timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Cancellation receiver, for callers that spawn their own processes.
    pub fn cancel_signal(&self) -> Option<watch::Receiver<bool>> {
        self.cancel_rx.clone()
    }

    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run and stream progress snapshots to `progress_callback`.
    ///
    /// A failed run never leaves its output file behind.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let result = self.execute(cmd, progress_callback).await;
        if result.is_err() && cmd.writes_file() {
            if let Err(e) = tokio::fs::remove_file(cmd.output()).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %cmd.output().display(), "Failed to remove partial output: {}", e);
                }
            }
        }
        result
    }

    async fn execute<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines feed the callback; everything else is kept for diagnostics.
        let stderr_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(snapshot) = current_progress.absorb(&line) {
                        progress_callback(snapshot);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }

    pub(crate) async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let timeout_secs = self.timeout_secs;
        let deadline = async move {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = wait_cancelled(self.cancel_rx.clone()) => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = deadline => {
                warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs.unwrap_or_default());
                let _ = child.kill().await;
                Err(MediaError::Timeout(timeout_secs.unwrap_or_default()))
            }
        }
    }
}

/// Resolves once the signal flips to `true`; never resolves without a signal.
pub(crate) async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling.
            return std::future::pending().await;
        }
    }
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264");

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i, "seek must precede its input");
        assert_eq!(args[ss + 1], "10.000");
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_multiple_inputs_keep_their_args() {
        let cmd = FfmpegCommand::to_output("out.mp4")
            .input("a.mp4")
            .lavfi("anullsrc=r=48000:cl=stereo")
            .duration(2.0)
            .map("[v]");

        let args = cmd.build_args().join(" ");
        assert!(args.contains("-i a.mp4 -f lavfi -t 2.000 -i anullsrc=r=48000:cl=stereo -map [v] out.mp4"));
    }

    #[test]
    fn test_null_output() {
        let cmd = FfmpegCommand::null_output().input("in.mp4");
        assert!(!cmd.writes_file());
        let args = cmd.build_args();
        assert_eq!(&args[args.len() - 3..], &["-f", "null", "-"]);
    }

    #[tokio::test]
    async fn test_cancel_signal_resolves() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_cancelled(Some(rx)));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancel wait should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_already_cancelled_runner_short_circuits() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let runner = FfmpegRunner::new().with_cancel(rx);
        let cmd = FfmpegCommand::new("missing.mp4", "/nonexistent/out.mp4");
        assert!(matches!(runner.run(&cmd).await, Err(MediaError::Cancelled)));
    }
}
