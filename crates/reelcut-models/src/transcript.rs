//! Timed transcript entries and the SRT interchange format.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

use crate::segment::Segment;

static TIMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("valid SRT timing regex")
});

/// One caption cue, timed in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Errors from parsing SRT content.
#[derive(Debug, Error)]
pub enum SrtParseError {
    #[error("invalid timing line {line}: {content}")]
    InvalidTiming { line: usize, content: String },

    #[error("cue ends before it starts at line {line}")]
    InvertedCue { line: usize },
}

/// Transcript of the whole source, ordered by entry start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Build a transcript, sorting entries by start time.
    pub fn new(mut entries: Vec<TranscriptEntry>) -> Self {
        entries.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { entries }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries overlapping `segment`, re-timed relative to its start and
    /// clipped to `[0, segment.duration()]`.
    pub fn slice(&self, segment: &Segment) -> Transcript {
        let offset = segment.start();
        let limit = segment.duration();
        let entries = self
            .entries
            .iter()
            .filter(|e| segment.overlaps(e.start, e.end))
            .map(|e| TranscriptEntry {
                start: (e.start - offset).clamp(0.0, limit),
                end: (e.end - offset).clamp(0.0, limit),
                text: e.text.clone(),
            })
            .filter(|e| e.end > e.start)
            .collect();
        Transcript { entries }
    }

    /// Parse SRT text.
    ///
    /// Cue numbers are accepted but not required. Blank text cues are skipped.
    pub fn from_srt(content: &str) -> Result<Self, SrtParseError> {
        let mut entries = Vec::new();
        let mut timing: Option<(f64, f64)> = None;
        let mut text = String::new();

        let mut flush = |timing: &mut Option<(f64, f64)>, text: &mut String| {
            if let Some((start, end)) = timing.take() {
                let body = text.trim();
                if !body.is_empty() {
                    entries.push(TranscriptEntry::new(start, end, body));
                }
            }
            text.clear();
        };

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim().trim_start_matches('\u{feff}');

            if line.is_empty() {
                flush(&mut timing, &mut text);
                continue;
            }

            // A timing line opens a cue even when the previous one was not
            // closed by a blank line; its counter then sits at the end of the text.
            let opens_cue = if timing.is_none() {
                line.contains("-->")
            } else {
                TIMING_LINE.is_match(line)
            };

            if opens_cue {
                if timing.is_some() {
                    drop_trailing_counter(&mut text);
                    flush(&mut timing, &mut text);
                }
                let (start, end) =
                    parse_timing(line).ok_or_else(|| SrtParseError::InvalidTiming {
                        line: line_no,
                        content: line.to_string(),
                    })?;
                if end < start {
                    return Err(SrtParseError::InvertedCue { line: line_no });
                }
                timing = Some((start, end));
                continue;
            }

            // Cue counters and stray lines before a timing line are ignored.
            if timing.is_none() {
                continue;
            }

            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line);
        }
        flush(&mut timing, &mut text);

        Ok(Self::new(entries))
    }

    /// Render as SRT, numbering cues from 1.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let _ = write!(
                out,
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_srt_timestamp(entry.start),
                format_srt_timestamp(entry.end),
                entry.text
            );
        }
        out
    }
}

/// Remove a final line that is only a cue number.
fn drop_trailing_counter(text: &mut String) {
    let last_start = text.rfind('\n').map_or(0, |i| i + 1);
    let last = &text[last_start..];
    if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
        text.truncate(last_start.saturating_sub(1));
    }
}

fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let caps = TIMING_LINE.captures(line)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let to_secs = |base: usize| -> Option<f64> {
        let (h, m, s, ms) = (part(base)?, part(base + 1)?, part(base + 2)?, part(base + 3)?);
        if m >= 60 || s >= 60 {
            return None;
        }
        Some((h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0)
    };
    Some((to_secs(1)?, to_secs(5)?))
}

/// Format seconds as `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}
