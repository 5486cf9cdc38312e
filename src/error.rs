//! Error taxonomy for wallgrid.
//!
//! Fatal, user-facing failures (bad setup, missing mandatory tools, a
//! terminal that cannot hold even one cell) get their own variants so the
//! top level can print actionable messages. Per-script and per-wallpaper
//! failures stay `anyhow` errors and are reported where they happen.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WallgridError {
    #[error("no wallpapers found in {dir} (supported: jpeg, jpg, png, webp)")]
    NoWallpapersFound { dir: PathBuf },

    #[error("external tool `{tool}` failed: {detail}")]
    ExternalTool { tool: String, detail: String },

    #[error("extension script `{script}` is missing required capability `{capability}`")]
    MissingCapability { script: String, capability: &'static str },

    #[error(
        "no wallpaper daemon handler found in {dir}; install exactly one executable \
         that sets the wallpaper when called with an image path"
    )]
    NoDaemonHandler { dir: PathBuf },

    #[error("expected exactly one daemon handler in {dir}, found {count}")]
    AmbiguousDaemonHandler { dir: PathBuf, count: usize },

    #[error(
        "terminal is too small for a {cell_w}x{cell_h} cell ({term_w}x{term_h} available); \
         enable pagination, reduce the image size, or enable auto-scaling"
    )]
    InsufficientScreenSize {
        term_w: u16,
        term_h: u16,
        cell_w: u16,
        cell_h: u16,
    },

    #[error("theme config missing for script `{script}` at {path} (generation should have run first)")]
    ThemeCacheMiss { script: String, path: PathBuf },
}
