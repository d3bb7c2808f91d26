//! Filesystem helpers for publishing stage outputs.
//!
//! FFmpeg always writes to a `*.partial.<ext>` sibling of the final path; the
//! finished file is then published with a rename so a failed stage never
//! leaves a complete-looking output behind.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// The in-progress sibling for `path`: `clip.mp4` becomes `clip.partial.mp4`.
pub fn partial_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    path.with_file_name(name)
}

/// Rename a finished partial file onto its final path.
pub async fn publish(partial: &Path, final_path: &Path) -> MediaResult<()> {
    let meta = fs::metadata(partial)
        .await
        .map_err(|_| MediaError::internal(format!("missing output {}", partial.display())))?;
    if meta.len() == 0 {
        remove_quietly(partial).await;
        return Err(MediaError::internal(format!(
            "empty output {}",
            partial.display()
        )));
    }
    move_file(partial, final_path).await
}

/// Remove a file, ignoring absence and logging anything else.
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove file: {}", e);
        }
    }
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first; EXDEV falls back to copy-and-delete through
/// a temporary sibling of `dst` so the destination appears atomically.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = partial_path(dst);

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        remove_quietly(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    remove_quietly(src).await;
    Ok(())
}
