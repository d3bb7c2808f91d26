//! Lookup table discovery.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::debug;

use reelcut_models::StylePreset;

/// Directory of `.cube` 3D lookup tables.
#[derive(Debug, Clone)]
pub struct LutLibrary {
    dir: PathBuf,
}

impl LutLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All tables in the directory, sorted by file name.
    pub fn tables(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut tables: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_cube(p))
            .collect();
        tables.sort();
        tables
    }

    /// `<preset>.cube` if present, otherwise a random table. `None` when the
    /// library is empty or missing.
    pub fn select<R: Rng + ?Sized>(&self, preset: StylePreset, rng: &mut R) -> Option<PathBuf> {
        let tables = self.tables();
        if !preset.wants_random_lut() {
            let wanted = format!("{}.cube", preset.as_str());
            if let Some(named) = tables.iter().find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().eq_ignore_ascii_case(&wanted))
                    .unwrap_or(false)
            }) {
                return Some(named.clone());
            }
        }
        let chosen = tables.choose(rng).cloned();
        debug!(preset = %preset, lut = ?chosen, "Selected lookup table");
        chosen
    }
}

fn is_cube(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("cube"))
        .unwrap_or(false)
}
