//! Visual style presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Contrast, brightness and saturation applied through FFmpeg's `eq` filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorGrade {
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
}

impl ColorGrade {
    pub const fn new(contrast: f64, brightness: f64, saturation: f64) -> Self {
        Self {
            contrast,
            brightness,
            saturation,
        }
    }
}

/// Named visual treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    #[default]
    Cinematic,
    Warm,
    Cold,
    Bw,
    /// Cinematic grade with a lookup table picked at random.
    Random,
}

impl StylePreset {
    pub const ALL: [StylePreset; 5] = [
        StylePreset::Cinematic,
        StylePreset::Warm,
        StylePreset::Cold,
        StylePreset::Bw,
        StylePreset::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::Cinematic => "cinematic",
            StylePreset::Warm => "warm",
            StylePreset::Cold => "cold",
            StylePreset::Bw => "bw",
            StylePreset::Random => "random",
        }
    }

    /// Resolve a user-supplied name, falling back to cinematic when unknown.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    /// The complete grade for this preset.
    pub fn grade(&self) -> ColorGrade {
        match self {
            StylePreset::Cinematic | StylePreset::Random => ColorGrade::new(1.10, 0.03, 1.15),
            StylePreset::Warm => ColorGrade::new(1.08, 0.04, 1.20),
            StylePreset::Cold => ColorGrade::new(1.12, 0.00, 0.95),
            StylePreset::Bw => ColorGrade::new(1.15, 0.02, 0.00),
        }
    }

    /// Whether lookup table selection should ignore the preset name.
    pub fn wants_random_lut(&self) -> bool {
        matches!(self, StylePreset::Random)
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StylePreset {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cinematic" => Ok(StylePreset::Cinematic),
            "warm" => Ok(StylePreset::Warm),
            "cold" => Ok(StylePreset::Cold),
            "bw" | "b&w" | "mono" => Ok(StylePreset::Bw),
            "random" => Ok(StylePreset::Random),
            _ => Err(StyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown style preset: {0}")]
pub struct StyleParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_names() {
        for preset in StylePreset::ALL {
            assert_eq!(preset.as_str().parse::<StylePreset>().unwrap(), preset);
        }
        assert_eq!("WARM".parse::<StylePreset>().unwrap(), StylePreset::Warm);
    }

    #[test]
    fn test_unknown_falls_back_to_cinematic() {
        assert!("neon".parse::<StylePreset>().is_err());
        assert_eq!(StylePreset::resolve("neon"), StylePreset::Cinematic);
        assert_eq!(StylePreset::resolve(""), StylePreset::Cinematic);
    }

    #[test]
    fn test_grades() {
        assert_eq!(StylePreset::Cold.grade(), ColorGrade::new(1.12, 0.0, 0.95));
        assert_eq!(StylePreset::Bw.grade().saturation, 0.0);
        assert_eq!(StylePreset::Random.grade(), StylePreset::Cinematic.grade());
        assert!(StylePreset::Random.wants_random_lut());
        assert!(!StylePreset::Warm.wants_random_lut());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&StylePreset::Bw).unwrap();
        assert_eq!(json, "\"bw\"");
    }
}
