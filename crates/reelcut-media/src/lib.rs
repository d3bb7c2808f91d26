#![deny(unreachable_patterns)]
//! FFmpeg-backed media stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Progress parsing from `-progress pipe:2`
//! - Raw frame decoding for in-process analysis
//! - Shot segmentation, subject-aware reframing, visual enhancement,
//!   caption burn-in and final assembly

pub mod assemble;
pub mod captions;
pub mod command;
pub mod enhance;
pub mod error;
pub mod filters;
pub mod frames;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod progress;
pub mod reframe;
pub mod segmenter;

pub use assemble::{Assembler, Rendered, DEFAULT_CROSSFADE_SECS};
pub use captions::{
    CaptionCompositor, CaptionStyle, Captioned, SrtFileSource, TranscriptSource,
    WhisperCliTranscriber,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use enhance::{Enhanced, Enhancer, LutLibrary, Stabilizer, VidStabStabilizer};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use reframe::{Reframed, Reframer, SubjectDetector};
#[cfg(feature = "opencv")]
pub use reframe::YuNetSubjectDetector;
pub use segmenter::{
    ContentShotDetector, FrameDifferenceDetector, Segmentation, Segmenter, ShotDetector,
    ShotParams,
};
