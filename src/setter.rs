//! Orchestration.
//!
//! Wires the pipeline together: daemon handler -> repository -> thumbnail
//! cache -> color cache -> theme engine -> grid UI, and applies the user's
//! selection. Applying means two independent branches running concurrently:
//! the per-app theme configs and the OS wallpaper itself; one branch failing
//! is reported without blocking the other.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rand::Rng;
use tokio::process::Command;

use crate::colors::ColorCache;
use crate::config::Config;
use crate::error::WallgridError;
use crate::notify;
use crate::repository::{self, Wallpaper};
use crate::theme::ThemeEngine;
use crate::thumbs::ThumbnailCache;
use crate::ui::{GridUi, SelectionHandler, UiOptions};

/// The single executable that tells the running wallpaper daemon (swww,
/// swaybg, hyprpaper, ...) to change the background.
#[derive(Debug)]
pub struct DaemonHandler {
    name: String,
    path: PathBuf,
}

impl DaemonHandler {
    /// Exactly one handler is expected; zero means nothing can apply a
    /// wallpaper, more than one is ambiguous. Both are setup errors.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut handlers: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read handler directory {}", dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();

        match handlers.len() {
            0 => Err(WallgridError::NoDaemonHandler { dir: dir.to_path_buf() }.into()),
            1 => {
                let path = handlers.remove(0);
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                Ok(Self { name, path })
            }
            count => {
                Err(WallgridError::AmbiguousDaemonHandler { dir: dir.to_path_buf(), count }.into())
            }
        }
    }

    pub async fn set_wallpaper(&self, image: &Path) -> Result<()> {
        let output = Command::new(&self.path)
            .arg(image)
            .output()
            .await
            .with_context(|| format!("failed to launch daemon handler `{}`", self.name))?;
        if !output.status.success() {
            return Err(anyhow!(
                "daemon handler `{}` exited with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

pub struct WallpaperSetter {
    wallpaper_dir: PathBuf,
    theme: ThemeEngine,
    handler: DaemonHandler,
}

#[async_trait]
impl SelectionHandler for WallpaperSetter {
    async fn handle(&self, wallpaper: &Wallpaper) -> Result<()> {
        log::info!("applying {}", wallpaper.name);
        // The daemon gets the original image, not the thumbnail.
        let image = self.wallpaper_dir.join(&wallpaper.name);
        let ((), set_result) = tokio::join!(
            self.theme.apply(&wallpaper.unique_id),
            self.handler.set_wallpaper(&image),
        );
        if let Err(e) = set_result {
            notify::report("wallgrid: failed to set wallpaper", &e);
        }
        Ok(())
    }
}

pub async fn run(config: Config) -> Result<()> {
    let handler = DaemonHandler::load(&config.handler_dir)?;
    let wallpapers = repository::list(&config.wallpaper_dir)?;
    log::info!("found {} wallpapers in {}", wallpapers.len(), config.wallpaper_dir.display());

    let thumbs = ThumbnailCache::new(
        config.cache_root.join("pic"),
        config.resize_command.clone(),
        config.concurrency,
    );
    thumbs.ensure(&wallpapers, &config.wallpaper_dir).await?;
    thumbs.collect_garbage(&wallpapers)?;

    let mut colors = ColorCache::open(
        &config.cache_root,
        config.palette_command.clone(),
        config.concurrency,
    );
    colors.ensure(&wallpapers, &config.wallpaper_dir).await?;

    let theme = ThemeEngine::load(
        &config.scripts_dir,
        &config.cache_root.join("themes"),
        config.light,
        config.concurrency,
    )
    .await?;
    log::info!("loaded {} theme extensions", theme.extension_count());
    theme.ensure_generated(&wallpapers, &mut colors).await?;

    let setter = WallpaperSetter {
        wallpaper_dir: config.wallpaper_dir.clone(),
        theme,
        handler,
    };

    if config.random {
        let index = rand::thread_rng().gen_range(0..wallpapers.len());
        return setter.handle(&wallpapers[index]).await;
    }

    let options = UiOptions {
        image: config.image,
        padding: config.padding,
        pagination: config.pagination,
        autoscale: config.autoscale,
        placement_command: config.placement_command.clone(),
        font_command: config.font_command.clone(),
    };
    GridUi::new(&wallpapers, config.cache_root.join("pic"), options, &setter)
        .run()
        .await?;

    if config.hold {
        log::info!("grid closed, holding until interrupted");
        tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    }
    Ok(())
}
