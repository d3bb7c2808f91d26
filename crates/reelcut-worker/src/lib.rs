//! Pipeline driver for turning long videos into portrait reels.
//!
//! This crate provides:
//! - Environment-driven configuration
//! - Capability wiring with documented fallbacks
//! - Scene selection
//! - The stage-by-stage driver and its run summary

pub mod capabilities;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod scene_selector;
pub mod summary;

pub use capabilities::Capabilities;
pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::StageLogger;
pub use pipeline::Pipeline;
pub use summary::{Fallback, RunSummary, StageTiming};
