//! Theme engine.
//!
//! Theme extensions are standalone executables discovered in a scripts
//! directory. Each one must advertise three capabilities when called with
//! `capabilities`:
//!   - `dark-conf <hex>...`  prints a dark config for the given palette
//!   - `light-conf <hex>...` prints a light config for the given palette
//!   - `set <path>`          applies a previously generated config file
//!
//! Generated configs are cached per script under
//! `{themes_root}/{script}/{unique_id}-{light|dark}.conf`. A cached config
//! is only trusted while it is strictly newer than its script: touching a
//! script invalidates everything it ever produced, without version numbers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::colors::ColorCache;
use crate::error::WallgridError;
use crate::notify;
use crate::queue;
use crate::repository::Wallpaper;

const REQUIRED_CAPABILITIES: &[&str] = &["dark-conf", "light-conf", "set"];

#[derive(Debug, Clone)]
pub struct ThemeExtension {
    /// Script file name, also the name of its cache subdirectory.
    pub name: String,
    path: PathBuf,
    cache_dir: PathBuf,
}

impl ThemeExtension {
    async fn dark_conf(&self, colors: &[String]) -> Result<String> {
        self.capture("dark-conf", colors).await
    }

    async fn light_conf(&self, colors: &[String]) -> Result<String> {
        self.capture("light-conf", colors).await
    }

    async fn set_theme(&self, conf: &Path) -> Result<()> {
        let output = Command::new(&self.path)
            .arg("set")
            .arg(conf)
            .output()
            .await
            .with_context(|| format!("failed to launch extension script `{}`", self.name))?;
        if !output.status.success() {
            return Err(anyhow!(
                "extension script `{}` set failed with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    async fn capture(&self, capability: &str, colors: &[String]) -> Result<String> {
        let output = Command::new(&self.path)
            .arg(capability)
            .args(colors)
            .output()
            .await
            .with_context(|| format!("failed to launch extension script `{}`", self.name))?;
        if !output.status.success() {
            return Err(anyhow!(
                "extension script `{}` {capability} failed with {}: {}",
                self.name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn conf_path(&self, unique_id: &str, light: bool) -> PathBuf {
        self.cache_dir.join(format!("{unique_id}-{}.conf", mode_name(light)))
    }
}

pub fn mode_name(light: bool) -> &'static str {
    if light { "light" } else { "dark" }
}

/// A cached config is valid only if it exists and is strictly newer than the
/// script that generated it.
pub fn is_conf_cached(conf: &Path, script: &Path) -> bool {
    let conf_mtime = match fs::metadata(conf).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let script_mtime = fs::metadata(script)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::now());
    conf_mtime > script_mtime
}

#[derive(Debug)]
pub struct ThemeEngine {
    extensions: Vec<ThemeExtension>,
    light: bool,
    limit: usize,
}

impl ThemeEngine {
    /// Discovers and validates every extension script in `scripts_dir`,
    /// creating one cache subdirectory per script under `themes_root`.
    /// A script missing any required capability fails the whole load; no
    /// partial registration.
    pub async fn load(
        scripts_dir: &Path,
        themes_root: &Path,
        light: bool,
        limit: usize,
    ) -> Result<Self> {
        let mut extensions = Vec::new();
        if scripts_dir.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(scripts_dir)
                .with_context(|| format!("failed to read scripts dir {}", scripts_dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            entries.sort();

            for path in entries {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                validate_capabilities(&path, &name).await?;

                let cache_dir = themes_root.join(&name);
                fs::create_dir_all(&cache_dir).with_context(|| {
                    format!("failed to create theme cache dir {}", cache_dir.display())
                })?;
                extensions.push(ThemeExtension { name, path, cache_dir });
            }
        }

        if extensions.is_empty() {
            log::warn!("no theme extension scripts found in {}", scripts_dir.display());
        }
        Ok(Self { extensions, light, limit })
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Generates missing or stale theme configs for every wallpaper/script
    /// pair. Both variants of a pair are generated concurrently and joined
    /// before their files are written. One pair failing is reported and
    /// skipped; the rest of the batch continues.
    pub async fn ensure_generated(
        &self,
        wallpapers: &[Wallpaper],
        colors: &mut ColorCache,
    ) -> Result<()> {
        let mut tasks = Vec::new();
        for wallpaper in wallpapers {
            let Some(palette) = colors.get(&wallpaper.unique_id).cloned() else {
                // ensure() on the color cache ran before us, so this is an
                // internal inconsistency, not a user error.
                notify::report(
                    "wallgrid: palette missing",
                    &anyhow!("no cached palette for {}", wallpaper.name),
                );
                continue;
            };

            for ext in &self.extensions {
                let dark_conf = ext.conf_path(&wallpaper.unique_id, false);
                let light_conf = ext.conf_path(&wallpaper.unique_id, true);
                if is_conf_cached(&dark_conf, &ext.path) && is_conf_cached(&light_conf, &ext.path) {
                    continue;
                }

                let ext = ext.clone();
                let palette = palette.clone();
                let label = format!("{} x {}", ext.name, wallpaper.name);
                tasks.push(async move {
                    let (dark, light) =
                        tokio::join!(ext.dark_conf(&palette), ext.light_conf(&palette));
                    let dark = dark.with_context(|| format!("theme generation failed for {label}"))?;
                    let light =
                        light.with_context(|| format!("theme generation failed for {label}"))?;
                    tokio::fs::write(&dark_conf, dark)
                        .await
                        .with_context(|| format!("failed to write {}", dark_conf.display()))?;
                    tokio::fs::write(&light_conf, light)
                        .await
                        .with_context(|| format!("failed to write {}", light_conf.display()))?;
                    Ok(())
                });
            }
        }
        if tasks.is_empty() {
            return Ok(());
        }

        log::info!("generating {} theme configs", tasks.len());
        for result in queue::run(tasks, self.limit).await {
            if let Err(e) = result {
                notify::report("wallgrid: theme generation failed", &e);
            }
        }
        Ok(())
    }

    /// Applies the cached config of every script for the selected wallpaper,
    /// in the run-level light/dark mode. Scripts run concurrently; one
    /// script failing (including a cache miss, which generation should have
    /// prevented) is reported and does not stop the others.
    pub async fn apply(&self, unique_id: &str) {
        let mut set = JoinSet::new();
        for ext in &self.extensions {
            let ext = ext.clone();
            let conf = ext.conf_path(unique_id, self.light);
            set.spawn(async move {
                if !conf.exists() {
                    return Err(WallgridError::ThemeCacheMiss {
                        script: ext.name.clone(),
                        path: conf,
                    }
                    .into());
                }
                ext.set_theme(&conf)
                    .await
                    .with_context(|| format!("failed to apply theme `{}`", ext.name))
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => notify::report("wallgrid: theme apply failed", &e),
                Err(join_err) => log::error!("theme apply task panicked: {join_err}"),
            }
        }
    }
}

async fn validate_capabilities(path: &Path, name: &str) -> Result<()> {
    let output = Command::new(path)
        .arg("capabilities")
        .output()
        .await
        .map_err(|e| WallgridError::ExternalTool {
            tool: name.to_string(),
            detail: format!("could not query capabilities: {e}"),
        })?;
    if !output.status.success() {
        return Err(WallgridError::ExternalTool {
            tool: name.to_string(),
            detail: format!(
                "capability query exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }
    let advertised = String::from_utf8_lossy(&output.stdout);
    let advertised: Vec<&str> = advertised.split_whitespace().collect();

    for capability in REQUIRED_CAPABILITIES {
        if !advertised.contains(capability) {
            return Err(WallgridError::MissingCapability {
                script: name.to_string(),
                capability,
            }
            .into());
        }
    }
    Ok(())
}
