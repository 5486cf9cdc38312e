//! Wallpaper discovery.
//!
//! Scans a single directory (non-recursive) for supported image files and
//! assigns each a stable identity derived from the filesystem rather than
//! the filename, so renaming a wallpaper never invalidates its caches.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::WallgridError;

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallpaper {
    /// Original file name, shown to the user.
    pub name: String,
    /// Device id + inode + original extension. Survives renames; a content
    /// swap at the same inode keeps the old cache entries (accepted tradeoff).
    pub unique_id: String,
}

/// Lists all supported wallpapers in `dir`, sorted by name.
///
/// Fails if the directory cannot be read, if any candidate file cannot be
/// stat'ed, or if the filtered list ends up empty.
pub fn list(dir: &Path) -> Result<Vec<Wallpaper>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read wallpaper directory {}", dir.display()))?;

    let mut wallpapers = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read an entry of {}", dir.display()))?;
        let path = entry.path();
        let Some(ext) = supported_extension(&path) else {
            continue;
        };

        let meta = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if !meta.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        wallpapers.push(Wallpaper {
            name,
            unique_id: format!("{}{}.{}", meta.dev(), meta.ino(), ext),
        });
    }

    if wallpapers.is_empty() {
        return Err(WallgridError::NoWallpapersFound { dir: dir.to_path_buf() }.into());
    }

    wallpapers.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(wallpapers)
}

fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
