//! Source time ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A contiguous `[start, end)` range on the source timeline, in seconds.
///
/// Constructed through [`Segment::new`], which enforces `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
}

impl TryFrom<RawSegment> for Segment {
    type Error = SegmentError;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        Segment::new(raw.start, raw.end)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("segment bounds must be finite (start={start}, end={end})")]
    NotFinite { start: f64, end: f64 },

    #[error("segment start must be non-negative: {0}")]
    NegativeStart(f64),

    #[error("segment start {start} must be before end {end}")]
    Empty { start: f64, end: f64 },
}

impl Segment {
    /// Create a validated segment.
    pub fn new(start: f64, end: f64) -> Result<Self, SegmentError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SegmentError::NotFinite { start, end });
        }
        if start < 0.0 {
            return Err(SegmentError::NegativeStart(start));
        }
        if start >= end {
            return Err(SegmentError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Segment covering `[0, duration)`.
    pub fn whole(duration: f64) -> Result<Self, SegmentError> {
        Self::new(0.0, duration)
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Temporal midpoint, used for representative frame sampling.
    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Whether `[start, end)` intersects this segment with positive length.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        start < self.end && end > self.start
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}s-{:.2}s", self.start, self.end)
    }
}

/// Check that segments are sorted by start and do not overlap.
pub fn is_ordered_non_overlapping(segments: &[Segment]) -> bool {
    segments
        .windows(2)
        .all(|pair| pair[0].start <= pair[1].start && pair[0].end <= pair[1].start + 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        assert!(matches!(
            Segment::new(5.0, 2.0),
            Err(SegmentError::Empty { .. })
        ));
        assert!(Segment::new(3.0, 3.0).is_err());
        assert!(Segment::new(-1.0, 3.0).is_err());
        assert!(Segment::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_duration_and_midpoint() {
        let seg = Segment::new(10.0, 16.0).unwrap();
        assert!((seg.duration() - 6.0).abs() < 1e-9);
        assert!((seg.midpoint() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlaps() {
        let seg = Segment::new(10.0, 20.0).unwrap();
        assert!(seg.overlaps(5.0, 11.0));
        assert!(seg.overlaps(19.0, 25.0));
        assert!(!seg.overlaps(20.0, 25.0));
        assert!(!seg.overlaps(0.0, 10.0));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Segment = serde_json::from_str(r#"{"start":1.0,"end":2.5}"#).unwrap();
        assert!((ok.end() - 2.5).abs() < 1e-9);

        let bad = serde_json::from_str::<Segment>(r#"{"start":4.0,"end":2.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_ordering_check() {
        let a = Segment::new(0.0, 2.0).unwrap();
        let b = Segment::new(2.0, 5.0).unwrap();
        let c = Segment::new(4.0, 6.0).unwrap();
        assert!(is_ordered_non_overlapping(&[a, b]));
        assert!(!is_ordered_non_overlapping(&[a, b, c]));
        assert!(!is_ordered_non_overlapping(&[b, a]));
    }
}
