//! Shared data models for the reelcut pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Source time ranges (segments) and pipeline artifacts
//! - Transcripts and the SRT caption interchange format
//! - Style presets and their colour grades
//! - Subject boxes produced by detectors
//! - Delivery profile and encoding configuration
//! - Pipeline stages and run identifiers

pub mod artifact;
pub mod encoding;
pub mod run;
pub mod segment;
pub mod stage;
pub mod style;
pub mod subject;
pub mod transcript;

// Re-export common types
pub use artifact::PipelineArtifact;
pub use encoding::{DeliveryProfile, EncodingConfig};
pub use run::RunId;
pub use segment::{Segment, SegmentError};
pub use stage::PipelineStage;
pub use style::{ColorGrade, StylePreset};
pub use subject::SubjectBox;
pub use transcript::{SrtParseError, Transcript, TranscriptEntry};
