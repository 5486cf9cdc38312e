//! Color extraction cache.
//!
//! Maps `unique_id` to the palette an external extraction tool produced for
//! that image. The whole map lives in one JSON document (`colours.json`)
//! which is loaded lazily at most once per run and rewritten wholesale after
//! a batch of extractions, never per item.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::error::WallgridError;
use crate::queue;
use crate::repository::Wallpaper;

const CACHE_FILE: &str = "colours.json";
const PALETTE_DEPTH: u32 = 8;
const PALETTE_MAX_COLORS: u32 = 30;

pub struct ColorCache {
    path: PathBuf,
    extract_command: String,
    limit: usize,
    map: HashMap<String, Vec<String>>,
    loaded: bool,
}

impl ColorCache {
    pub fn open(cache_root: &Path, extract_command: String, limit: usize) -> Self {
        Self {
            path: cache_root.join(CACHE_FILE),
            extract_command,
            limit,
            map: HashMap::new(),
            loaded: false,
        }
    }

    /// Cached palette for a wallpaper, reloading the persisted file once
    /// before giving up on a miss.
    pub fn get(&mut self, unique_id: &str) -> Option<&Vec<String>> {
        if !self.map.contains_key(unique_id) && !self.loaded {
            self.reload();
        }
        self.map.get(unique_id)
    }

    /// Extracts palettes for every wallpaper not yet in the cache, then
    /// persists the whole map with a single write. Extraction failures are
    /// fatal: the palette tool is a mandatory dependency.
    pub async fn ensure(&mut self, wallpapers: &[Wallpaper], source_dir: &Path) -> Result<()> {
        if !self.loaded {
            self.reload();
        }

        let tasks: Vec<_> = wallpapers
            .iter()
            .filter(|w| !self.map.contains_key(&w.unique_id))
            .map(|w| {
                let command = self.extract_command.clone();
                let image = source_dir.join(&w.name);
                let unique_id = w.unique_id.clone();
                async move {
                    let colors = extract_palette(&command, &image).await?;
                    Ok((unique_id, colors))
                }
            })
            .collect();
        if tasks.is_empty() {
            return Ok(());
        }

        log::info!("extracting palettes for {} wallpapers", tasks.len());
        for result in queue::run(tasks, self.limit).await {
            let (unique_id, colors) = result?;
            self.map.insert(unique_id, colors);
        }
        self.persist()
    }

    fn reload(&mut self) {
        self.loaded = true;
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => self.map = map,
                Err(e) => log::warn!("ignoring corrupt {}: {e}", self.path.display()),
            },
            Err(_) => log::debug!("no color cache at {} yet", self.path.display()),
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.map)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write color cache {}", self.path.display()))
    }
}

/// Runs the palette tool against one image and keeps every token starting
/// with `#` from its histogram-style output, in output order.
async fn extract_palette(command: &str, image: &Path) -> Result<Vec<String>> {
    let output = Command::new(command)
        .arg(image)
        .arg("-depth")
        .arg(PALETTE_DEPTH.to_string())
        .arg("-colors")
        .arg(PALETTE_MAX_COLORS.to_string())
        .arg("-format")
        .arg("%c")
        .arg("histogram:info:-")
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
                "palette extraction of {} exited with {}: {}",
                image.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    Ok(parse_histogram(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_histogram(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().find(|token| token.starts_with('#')))
        .map(str::to_string)
        .collect()
}
