//! Enhancement filter graph.

use std::path::Path;

use reelcut_models::ColorGrade;

use crate::filters::{normalize_portrait, quote_filter_path};

/// Unsharp mask applied before grading.
pub const SHARPEN: &str = "unsharp=3:3:0.6";
/// Vignette angle.
pub const VIGNETTE: &str = "vignette=0.4";
/// Gaussian softening after the vignette.
pub const SOFTEN: &str = "gblur=sigma=1.2";
/// Light temporal grain.
pub const GRAIN: &str = "noise=alls=10:allf=t";
/// Blur radius of the bloom layer.
pub const BLOOM_BLUR: &str = "boxblur=10";
/// Opacity of the bloom layer when screened over the base.
pub const BLOOM_OPACITY: f64 = 0.25;

/// `eq` filter for a grade.
pub fn eq_filter(grade: &ColorGrade) -> String {
    format!(
        "eq=contrast={:.2}:brightness={:.2}:saturation={:.2}",
        grade.contrast, grade.brightness, grade.saturation
    )
}

/// Full filter graph from input `[0:v]` to output label `[v]`.
pub fn enhance_graph(grade: &ColorGrade, lut: Option<&Path>) -> String {
    let mut chain = vec![
        normalize_portrait(),
        SHARPEN.to_string(),
        eq_filter(grade),
    ];
    if let Some(lut) = lut {
        chain.push(format!("lut3d=file={}", quote_filter_path(lut)));
    }
    chain.push(VIGNETTE.to_string());
    chain.push(SOFTEN.to_string());
    chain.push(GRAIN.to_string());

    format!(
        "[0:v]{},split=2[base][glow];[glow]{}[bloom];\
         [base][bloom]blend=all_mode=screen:all_opacity={:.2},format=yuv420p[v]",
        chain.join(","),
        BLOOM_BLUR,
        BLOOM_OPACITY
    )
}
