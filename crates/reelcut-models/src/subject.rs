use serde::{Deserialize, Serialize};

/// Detected subject region in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

impl SubjectBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Pick the box with the largest area.
    pub fn largest(boxes: &[SubjectBox]) -> Option<SubjectBox> {
        boxes
            .iter()
            .filter(|b| b.area() > 0.0)
            .max_by(|a, b| a.area().total_cmp(&b.area()))
            .copied()
    }
}
