//! Stage-by-stage pipeline driver.
//!
//! `Segmenting -> Selecting -> Reframing -> Enhancing -> Captioning ->
//! Rendering -> Done`. Within a stage, excerpts run concurrently up to
//! `max_parallel_excerpts`; results always come back in excerpt order.

use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, info_span, warn, Instrument};

use reelcut_media::metrics::record_fallback;
use reelcut_media::{
    check_ffmpeg, check_ffprobe, Assembler, CaptionCompositor, Enhancer, FfmpegRunner,
    MediaError, MediaResult, Reframer, Segmenter,
};
use reelcut_models::{PipelineArtifact, PipelineStage, RunId, Segment, Transcript};

use crate::capabilities::Capabilities;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::metrics::{record_run, record_stage_duration};
use crate::scene_selector;
use crate::summary::{Fallback, RunSummary, StageTiming};

/// Tracks the current stage and its timings.
struct StageClock {
    run_id: RunId,
    current: PipelineStage,
    started: Instant,
    timings: Vec<StageTiming>,
}

impl StageClock {
    fn new(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.clone(),
            current: PipelineStage::Segmenting,
            started: Instant::now(),
            timings: Vec::new(),
        }
    }

    fn logger(&self) -> StageLogger {
        StageLogger::new(&self.run_id, self.current)
    }

    /// Close the current stage and move to the next one.
    fn advance(&mut self, message: &str) {
        let elapsed = self.started.elapsed();
        self.logger().log_completion(elapsed, message);
        record_stage_duration(self.current, elapsed.as_secs_f64());
        self.timings.push(StageTiming {
            stage: self.current,
            seconds: elapsed.as_secs_f64(),
        });
        if let Some(next) = self.current.next() {
            self.current = next;
            self.started = Instant::now();
        }
    }

    fn fail(&self, source: MediaError) -> PipelineError {
        let err = PipelineError::stage(self.current, source);
        if !err.is_cancelled() {
            self.logger().log_error(&err.to_string());
        }
        err
    }
}

/// Turns one source video into a portrait deliverable.
pub struct Pipeline {
    config: WorkerConfig,
    capabilities: Capabilities,
    runner: FfmpegRunner,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, capabilities: Capabilities) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = config.ffmpeg_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }
        Self {
            config,
            capabilities,
            runner,
        }
    }

    /// Abort in-flight FFmpeg work when the receiver flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn run(&self, source: &Path) -> PipelineResult<RunSummary> {
        self.run_with_id(source, RunId::new()).await
    }

    /// Run the whole pipeline on `source`.
    ///
    /// Intermediates live in `work_dir/run_<id>`; the directory is removed on
    /// success and kept for inspection on failure or cancellation.
    pub async fn run_with_id(&self, source: &Path, run_id: RunId) -> PipelineResult<RunSummary> {
        if !source.is_file() {
            let missing = MediaError::FileNotFound(source.to_path_buf());
            let err = StageClock::new(&run_id).fail(missing);
            record_run("failed");
            return Err(err);
        }

        let run_dir = self.config.work_dir.join(format!("run_{}", run_id.short()));
        tokio::fs::create_dir_all(&run_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let span = info_span!("run", run_id = %run_id.short());
        let result = self
            .execute(source, &run_id, &run_dir)
            .instrument(span)
            .await;

        match &result {
            Ok(summary) => {
                record_run("ok");
                if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
                    warn!(path = %run_dir.display(), "Failed to remove run directory: {}", e);
                }
                info!(
                    run_id = %run_id.short(),
                    deliverable = %summary.deliverable.display(),
                    normalized = summary.normalized,
                    fallbacks = summary.fallbacks.len(),
                    "Run complete"
                );
            }
            Err(e) if e.is_cancelled() => {
                record_run("cancelled");
                warn!(run_id = %run_id.short(), work_dir = %run_dir.display(), "Run cancelled");
            }
            Err(e) => {
                record_run("failed");
                error!(
                    run_id = %run_id.short(),
                    work_dir = %run_dir.display(),
                    error = %e,
                    "Run failed"
                );
            }
        }
        result
    }

    async fn execute(
        &self,
        source: &Path,
        run_id: &RunId,
        run_dir: &Path,
    ) -> PipelineResult<RunSummary> {
        let config = &self.config;
        let caps = &self.capabilities;
        let mut clock = StageClock::new(run_id);
        let mut fallbacks: Vec<Fallback> = caps
            .unavailable
            .iter()
            .map(|(capability, reason)| Fallback::run_wide(*capability, reason.clone()))
            .collect();

        let (mut selection_rng, lut_rng) = match config.selection_seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };

        // Segmenting, with transcription alongside
        clock.logger().log_start(&source.display().to_string());
        check_ffmpeg()
            .and_then(|_| check_ffprobe())
            .map_err(|e| clock.fail(e))?;

        let segmenter = Segmenter::new(caps.shot_detector.clone(), self.runner.clone());
        let (segmentation, transcript) = segment_alongside(
            segmenter.detect(source, config.threshold, config.min_scene_len),
            self.load_transcript(source, run_dir),
        )
        .await
        .map_err(|e| clock.fail(e))?;
        if let Some(reason) = &segmentation.fallback_reason {
            fallbacks.push(Fallback::run_wide("shot_detector", reason.clone()));
        }

        let transcript: Option<Arc<Transcript>> = match transcript {
            Ok(Some(transcript)) => Some(Arc::new(transcript)),
            Ok(None) => {
                clock.logger().log_warning("no transcript source configured, captions disabled");
                record_fallback("transcript");
                fallbacks.push(Fallback::run_wide(
                    "transcript",
                    "no transcript source configured",
                ));
                None
            }
            Err(MediaError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => {
                clock
                    .logger()
                    .log_warning(&format!("transcript unavailable, captions disabled: {}", e));
                record_fallback("transcript");
                fallbacks.push(Fallback::run_wide("transcript", e.to_string()));
                None
            }
        };

        clock.advance(&format!(
            "{} shots in {:.1}s source",
            segmentation.segments.len(),
            segmentation.duration
        ));

        // Selecting
        let mut segments = scene_selector::select(
            &segmentation.segments,
            config.desired_scenes,
            Some(segmentation.duration),
            &mut selection_rng,
        );
        if segments.is_empty() {
            let window =
                scene_selector::fallback_window(segmentation.duration, config.fallback_window_secs)
                    .ok_or(PipelineError::NothingToRender)?;
            clock.logger().log_warning("no shots detected, using the opening window");
            record_fallback("selection");
            fallbacks.push(Fallback::run_wide(
                "selection",
                format!("no shots detected, using the first {:.1}s", window.duration()),
            ));
            segments.push(window);
        }
        if config.preview && segments.len() > 1 {
            segments.truncate(1);
            clock.logger().log_progress("preview mode, keeping the first excerpt only");
        }
        clock.advance(&format!("{} excerpts", segments.len()));

        // Reframing
        clock.logger().log_start(&format!("{} excerpts", segments.len()));
        let reframer = Reframer::new(caps.subject_detector.clone(), self.runner.clone());
        let reframed = self
            .for_each_excerpt(&segments, |index, segment| {
                reframer.reframe(source, segment, index, run_dir)
            })
            .await
            .map_err(|e| clock.fail(e))?;
        for r in &reframed {
            if let Some(reason) = &r.fallback_reason {
                fallbacks.push(Fallback::for_excerpt(
                    "subject_detector",
                    r.artifact.index,
                    reason.clone(),
                ));
            }
        }
        let reframed: Vec<PipelineArtifact> = reframed.into_iter().map(|r| r.artifact).collect();
        clock.advance("reframed to portrait");

        // Enhancing
        clock.logger().log_start(&format!("style {}", config.style));
        let enhancer = Enhancer::new(self.runner.clone())
            .with_stabilizer(caps.stabilizer.clone())
            .with_luts(caps.luts.clone())
            .with_rng(lut_rng);
        let enhanced = self
            .for_each_excerpt(&reframed, |_, clip| {
                enhancer.enhance(clip, config.style, run_dir)
            })
            .await
            .map_err(|e| clock.fail(e))?;
        for e in &enhanced {
            for (capability, reason) in &e.skipped {
                fallbacks.push(Fallback::for_excerpt(
                    *capability,
                    e.artifact.index,
                    reason.clone(),
                ));
            }
        }
        clock.advance("graded");

        // Captioning
        clock.logger().log_start(if transcript.is_some() {
            "burning captions"
        } else {
            "no transcript, passing clips through"
        });
        let compositor = CaptionCompositor::new(self.runner.clone());
        let excerpts: Vec<(PipelineArtifact, Segment)> = enhanced
            .into_iter()
            .map(|e| e.artifact)
            .zip(segments.iter().copied())
            .collect();
        let captioned = self
            .for_each_excerpt(&excerpts, |_, (clip, segment)| {
                compositor.overlay(clip, segment, transcript.as_deref(), config.preview, run_dir)
            })
            .await
            .map_err(|e| clock.fail(e))?;
        if transcript.is_some() {
            for c in &captioned {
                if let Some(reason) = &c.skipped {
                    fallbacks.push(Fallback::for_excerpt(
                        "captions",
                        c.artifact.index,
                        reason.clone(),
                    ));
                }
            }
        }
        let cues: usize = captioned.iter().map(|c| c.cues).sum();
        let clips: Vec<PipelineArtifact> = captioned.into_iter().map(|c| c.artifact).collect();
        clock.advance(&format!("{} cues burned in", cues));

        // Rendering
        clock.logger().log_start(&format!("{} clips", clips.len()));
        let assembler = Assembler::new(self.runner.clone()).with_crossfade(config.crossfade_secs);
        let rendered = assembler
            .render(&clips, &config.output_dir)
            .await
            .map_err(|e| clock.fail(e))?;
        if !rendered.normalized {
            fallbacks.push(Fallback::run_wide(
                "loudnorm",
                "loudness normalization failed, delivering the unnormalized render",
            ));
        }
        clock.advance(&rendered.path.display().to_string());
        debug_assert!(clock.current.is_terminal());

        Ok(RunSummary {
            run_id: run_id.clone(),
            source: source.to_path_buf(),
            deliverable: rendered.path,
            normalized: rendered.normalized,
            style: config.style,
            preview: config.preview,
            source_duration: segmentation.duration,
            segments,
            crossfade: rendered.crossfade,
            expected_duration: rendered.expected_duration,
            stage_timings: clock.timings,
            fallbacks,
        })
    }

    /// `Ok(None)` when no transcript source is configured.
    async fn load_transcript(
        &self,
        source: &Path,
        run_dir: &Path,
    ) -> MediaResult<Option<Transcript>> {
        let Some(transcript_source) = &self.capabilities.transcript_source else {
            return Ok(None);
        };
        let transcript = transcript_source
            .transcript(source, run_dir, &self.runner)
            .await?;
        info!(
            source = transcript_source.name(),
            cues = transcript.len(),
            "Transcript loaded"
        );
        Ok(Some(transcript))
    }

    /// Run `op` over every item with bounded concurrency, keeping item order.
    /// The first failure cancels the remaining work.
    async fn for_each_excerpt<'a, T, U, F, Fut>(&self, items: &'a [T], op: F) -> MediaResult<Vec<U>>
    where
        F: Fn(usize, &'a T) -> Fut,
        Fut: Future<Output = MediaResult<U>>,
    {
        let semaphore = Semaphore::new(self.config.max_parallel_excerpts.max(1));
        let semaphore = &semaphore;
        let op = &op;
        let tasks = items.iter().enumerate().map(|(index, item)| async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| MediaError::internal("excerpt semaphore closed"))?;
            op(index, item).await
        });
        try_join_all(tasks).await
    }
}

/// Run segmentation next to other work. A segmentation failure drops the
/// other future at once, killing any child process it owns.
async fn segment_alongside<S, T>(
    segmenting: impl Future<Output = MediaResult<S>>,
    other: impl Future<Output = T>,
) -> MediaResult<(S, T)> {
    tokio::try_join!(segmenting, async { Ok::<T, MediaError>(other.await) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pipeline(parallel: usize) -> Pipeline {
        let config = WorkerConfig {
            max_parallel_excerpts: parallel,
            ..Default::default()
        };
        Pipeline::new(config, Capabilities::default())
    }

    #[tokio::test]
    async fn test_for_each_excerpt_keeps_order() {
        let p = pipeline(3);
        let items: Vec<u64> = vec![30, 5, 20, 1];
        let out = p
            .for_each_excerpt(&items, |index, delay| async move {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
                Ok(index)
            })
            .await
            .unwrap();
        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_for_each_excerpt_bounds_concurrency() {
        let p = pipeline(2);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (active, peak) = (&active, &peak);
        let items = vec![(); 6];
        p.for_each_excerpt(&items, move |_, _| async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_for_each_excerpt_propagates_failure() {
        let p = pipeline(2);
        let items = vec![1, 2, 3];
        let err = p
            .for_each_excerpt(&items, |_, n| async move {
                if *n == 2 {
                    Err(MediaError::internal("boom"))
                } else {
                    Ok(*n)
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
    }

    #[tokio::test]
    async fn test_segmentation_failure_does_not_wait_for_transcript() {
        let failing = async { Err::<(), _>(MediaError::input_unreadable("/v.mp4", "bad moov")) };
        let slow_transcript = tokio::time::sleep(Duration::from_secs(60));

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            segment_alongside(failing, slow_transcript),
        )
        .await
        .expect("segmentation failure should not wait on the transcript");
        assert!(result.unwrap_err().is_input_error());
    }

    #[tokio::test]
    async fn test_segment_alongside_keeps_both_results() {
        let (segments, transcript) = segment_alongside(async { Ok(3usize) }, async {
            Err::<(), _>(MediaError::capability_unavailable("whisper"))
        })
        .await
        .unwrap();
        assert_eq!(segments, 3);
        assert!(transcript.is_err());
    }

    #[test]
    fn test_stage_clock_walks_every_stage() {
        let mut clock = StageClock::new(&RunId::new());
        let mut seen = vec![clock.current];
        while !clock.current.is_terminal() {
            clock.advance("step");
            seen.push(clock.current);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(clock.timings.len(), 6);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected() {
        let err = pipeline(1)
            .run(Path::new("/no/such/source.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(PipelineStage::Segmenting));
        assert!(err.is_input_error());
        assert!(matches!(
            err,
            PipelineError::Stage {
                source: MediaError::FileNotFound(_),
                ..
            }
        ));
    }

    #[test]
    fn test_stage_failure_carries_stage() {
        let mut clock = StageClock::new(&RunId::new());
        clock.advance("segmented");
        let err = clock.fail(MediaError::internal("x"));
        assert_eq!(err.failed_stage(), Some(PipelineStage::Selecting));
    }
}
