//! Shared FFmpeg filter fragments.

use std::path::Path;

use reelcut_models::DeliveryProfile;

/// Scale, frame rate, square pixels and pixel format of the delivery profile.
pub fn normalize_portrait() -> String {
    format!(
        "scale={}:{}:flags=lanczos,fps={},setsar=1,format={}",
        DeliveryProfile::WIDTH,
        DeliveryProfile::HEIGHT,
        DeliveryProfile::FPS,
        DeliveryProfile::PIX_FMT
    )
}

/// Quote a path for use as a filter option value.
pub fn quote_filter_path(path: &Path) -> String {
    format!("'{}'", escape_filter_path(&path.to_string_lossy()))
}

/// Escape characters that are special inside filter arguments.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Escape literal text for `drawtext`.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_portrait() {
        assert_eq!(
            normalize_portrait(),
            "scale=1080:1920:flags=lanczos,fps=30,setsar=1,format=yuv420p"
        );
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("C:\\luts\\a'b.cube"), "C\\:\\\\luts\\\\a\\'b.cube");
        assert_eq!(quote_filter_path(Path::new("/tmp/x.srt")), "'/tmp/x.srt'");
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("50%: ok"), "50\\%\\: ok");
    }
}
