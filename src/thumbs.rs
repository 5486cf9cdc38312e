//! Thumbnail cache.
//!
//! Keeps a resized, recompressed copy of every wallpaper under the cache
//! root, named by `unique_id`. Resizing is delegated to an external tool
//! (ImageMagick by default); this module only decides what is missing and
//! throttles how many resize processes run at once.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::error::WallgridError;
use crate::queue;
use crate::repository::Wallpaper;

const THUMB_WIDTH: u32 = 800;
const THUMB_HEIGHT: u32 = 600;
const THUMB_QUALITY: u32 = 50;

pub struct ThumbnailCache {
    cache_dir: PathBuf,
    resize_command: String,
    limit: usize,
}

impl ThumbnailCache {
    pub fn new(cache_dir: PathBuf, resize_command: String, limit: usize) -> Self {
        Self { cache_dir, resize_command, limit }
    }

    pub fn thumb_path(&self, unique_id: &str) -> PathBuf {
        self.cache_dir.join(unique_id)
    }

    /// Makes sure a thumbnail exists for every wallpaper. Short-circuits
    /// without spawning anything when the cache already covers the whole
    /// list. A resize failure is fatal: the tool is a mandatory dependency.
    pub async fn ensure(&self, wallpapers: &[Wallpaper], source_dir: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("failed to create thumbnail cache dir {}", self.cache_dir.display())
        })?;

        let existing = self.existing_ids()?;
        let missing: Vec<&Wallpaper> = wallpapers
            .iter()
            .filter(|w| !existing.contains(&w.unique_id))
            .collect();
        if missing.is_empty() {
            log::debug!("thumbnail cache already covers all {} wallpapers", wallpapers.len());
            return Ok(());
        }

        log::info!("generating {} missing thumbnails", missing.len());
        let tasks: Vec<_> = missing
            .into_iter()
            .map(|w| {
                let command = self.resize_command.clone();
                let source = source_dir.join(&w.name);
                let dest = self.thumb_path(&w.unique_id);
                async move { resize(&command, &source, &dest).await }
            })
            .collect();

        for result in queue::run(tasks, self.limit).await {
            result?;
        }
        Ok(())
    }

    /// Drops cached thumbnails that no longer match any listed wallpaper.
    pub fn collect_garbage(&self, wallpapers: &[Wallpaper]) -> Result<()> {
        let keep: HashSet<&str> = wallpapers.iter().map(|w| w.unique_id.as_str()).collect();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !keep.contains(name.as_str()) {
                log::debug!("removing stale thumbnail {name}");
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }

    fn existing_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for entry in fs::read_dir(&self.cache_dir).with_context(|| {
            format!("failed to read thumbnail cache dir {}", self.cache_dir.display())
        })? {
            ids.insert(entry?.file_name().to_string_lossy().to_string());
        }
        Ok(ids)
    }
}

async fn resize(command: &str, source: &Path, dest: &Path) -> Result<()> {
    let output = Command::new(command)
        .arg(source)
        .arg("-resize")
        .arg(format!("{THUMB_WIDTH}x{THUMB_HEIGHT}"))
        .arg("-quality")
        .arg(THUMB_QUALITY.to_string())
        .arg(dest)
        .output()
        .await
        .map_err(|e| WallgridError::ExternalTool {
            tool: command.to_string(),
            detail: format!("could not launch: {e}"),
        })?;

    if !output.status.success() {
        return Err(WallgridError::ExternalTool {
            tool: command.to_string(),
            detail: format!(
                "resize of {} exited with {}: {}",
                source.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }
    Ok(())
}
