//! Configuration.
//!
//! Read from `~/.config/wallgrid/config.toml` when present, otherwise
//! defaults; CLI flags override both. Paths in the file may use `~/`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;
use crate::grid::Size;
use crate::queue;

/// Resolves shell-style paths (e.g. "~/Pictures") to absolute paths.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[derive(Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    wallpaper_dir: String,
    scripts_dir: String,
    handler_dir: String,
    cache_root: String,
    image_width: u16,
    image_height: u16,
    padding_x: u16,
    padding_y: u16,
    pagination: bool,
    rows: usize,
    cols: usize,
    light: bool,
    autoscale: bool,
    resize_command: String,
    palette_command: String,
    placement_command: String,
    font_command: String,
    concurrency: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            wallpaper_dir: "~/Pictures/wallpapers".into(),
            scripts_dir: "~/.config/wallgrid/extensions".into(),
            handler_dir: "~/.config/wallgrid/handler".into(),
            cache_root: "~/.cache/wallgrid".into(),
            image_width: 24,
            image_height: 12,
            padding_x: 2,
            padding_y: 1,
            pagination: false,
            rows: 2,
            cols: 4,
            light: false,
            autoscale: true,
            resize_command: "magick".into(),
            palette_command: "magick".into(),
            placement_command: "kitten icat".into(),
            font_command: "kitten @ set-font-size".into(),
            concurrency: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub wallpaper_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub handler_dir: PathBuf,
    pub cache_root: PathBuf,
    pub image: Size,
    pub padding: Size,
    pub pagination: Option<(usize, usize)>,
    pub light: bool,
    pub autoscale: bool,
    pub resize_command: String,
    pub palette_command: String,
    pub placement_command: String,
    pub font_command: String,
    pub concurrency: usize,
    pub random: bool,
    pub hold: bool,
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match config_path() {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(&path).with_context(|| {
                    format!("failed to read config file {}", path.display())
                })?;
                toml::from_str(&raw).with_context(|| {
                    format!("failed to parse {}; check for syntax errors", path.display())
                })?
            }
            _ => FileConfig::default(),
        };
        Ok(Self::merge(file, cli))
    }

    fn merge(file: FileConfig, cli: &Cli) -> Self {
        let pagination = (cli.pagination || file.pagination).then(|| {
            (
                cli.rows.unwrap_or(file.rows).max(1),
                cli.cols.unwrap_or(file.cols).max(1),
            )
        });
        Self {
            wallpaper_dir: cli
                .dir
                .clone()
                .unwrap_or_else(|| expand_path(&file.wallpaper_dir)),
            scripts_dir: expand_path(&file.scripts_dir),
            handler_dir: expand_path(&file.handler_dir),
            cache_root: expand_path(&file.cache_root),
            image: Size::new(
                cli.image_width.unwrap_or(file.image_width).max(1),
                cli.image_height.unwrap_or(file.image_height).max(1),
            ),
            // The selection border lives in the padding ring, so a padding
            // of 0 would leave the grid without a visible selection.
            padding: Size::new(
                cli.padding_x.unwrap_or(file.padding_x).max(1),
                cli.padding_y.unwrap_or(file.padding_y).max(1),
            ),
            pagination,
            light: cli.light || file.light,
            autoscale: file.autoscale && !cli.no_autoscale,
            resize_command: file.resize_command,
            palette_command: file.palette_command,
            placement_command: file.placement_command,
            font_command: file.font_command,
            concurrency: cli
                .concurrency
                .or(file.concurrency)
                .unwrap_or_else(queue::default_limit)
                .max(1),
            random: cli.random,
            hold: cli.hold,
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wallgrid/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("wallgrid").chain(args.iter().copied()))
    }

    #[test]
    fn cli_flags_override_file_values() {
        let file = FileConfig::default();
        let config = Config::merge(file, &cli(&["--pagination", "--rows", "3", "--light"]));
        assert_eq!(config.pagination, Some((3, 4)));
        assert!(config.light);
    }

    #[test]
    fn pagination_defaults_to_off() {
        let config = Config::merge(FileConfig::default(), &cli(&[]));
        assert_eq!(config.pagination, None);
        assert!(!config.random);
        assert!(config.autoscale);
    }

    #[test]
    fn zero_padding_is_clamped_so_the_border_can_draw() {
        let raw = "padding_x = 0\npadding_y = 0";
        let file: FileConfig = toml::from_str(raw).unwrap();
        let config = Config::merge(file, &cli(&[]));
        assert!(config.padding.width >= 1);
        assert!(config.padding.height >= 1);
    }

    #[test]
    fn padding_flags_override_the_file() {
        let config = Config::merge(FileConfig::default(), &cli(&["--padding-x", "3"]));
        assert_eq!(config.padding.width, 3);
        assert_eq!(config.padding.height, 1);
    }

    #[test]
    fn no_autoscale_wins_over_the_file() {
        let config = Config::merge(FileConfig::default(), &cli(&["--no-autoscale"]));
        assert!(!config.autoscale);
    }

    #[test]
    fn parses_a_full_config_file() {
        let raw = r#"
            wallpaper_dir = "~/walls"
            pagination = true
            rows = 3
            cols = 5
            image_width = 30
            light = true
        "#;
        let file: FileConfig = toml::from_str(raw).unwrap();
        let config = Config::merge(file, &cli(&[]));
        assert_eq!(config.pagination, Some((3, 5)));
        assert_eq!(config.image.width, 30);
        assert!(config.light);
    }
}
