//! Portrait crop geometry.

use serde::{Deserialize, Serialize};

use reelcut_models::DeliveryProfile;

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Whether the rectangle lies entirely inside a `frame_w` x `frame_h` frame.
    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x + self.width <= frame_w
            && self.y + self.height <= frame_h
    }

    /// FFmpeg `crop` filter expression.
    pub fn to_filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Largest 9:16 crop for the frame, centred on `focus` (or the frame centre)
/// and clamped so it never leaves the frame.
pub fn portrait_crop(frame_w: u32, frame_h: u32, focus: Option<(f64, f64)>) -> CropRect {
    let frame_w = frame_w.max(2);
    let frame_h = frame_h.max(2);
    let aspect = DeliveryProfile::WIDTH as f64 / DeliveryProfile::HEIGHT as f64;

    let (width, height) = if frame_w as f64 / frame_h as f64 > aspect {
        // Wider than portrait: height binds
        let w = ((frame_h as f64 * aspect).round() as u32).min(frame_w);
        (even_floor(w), even_floor(frame_h))
    } else {
        let h = ((frame_w as f64 / aspect).round() as u32).min(frame_h);
        (even_floor(frame_w), even_floor(h))
    };

    let (cx, cy) = focus
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .unwrap_or((frame_w as f64 / 2.0, frame_h as f64 / 2.0));

    let x = clamp_origin(cx - width as f64 / 2.0, frame_w - width);
    let y = clamp_origin(cy - height as f64 / 2.0, frame_h - height);

    CropRect {
        x,
        y,
        width,
        height,
    }
}

fn clamp_origin(origin: f64, max: u32) -> u32 {
    origin.round().clamp(0.0, max as f64) as u32
}

fn even_floor(v: u32) -> u32 {
    (v / 2).max(1) * 2
}
