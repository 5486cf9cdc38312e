use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about = "Browse wallpapers in a terminal grid and apply one with matching themes")]
pub struct Cli {
    /// Wallpaper directory (overrides the config file)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Pick and apply a random wallpaper without opening the grid
    #[arg(short, long)]
    pub random: bool,

    /// Show wallpapers one fixed page at a time instead of one big grid
    #[arg(short, long)]
    pub pagination: bool,

    /// Grid rows per page (pagination mode)
    #[arg(long)]
    pub rows: Option<usize>,

    /// Grid columns per page (pagination mode)
    #[arg(long)]
    pub cols: Option<usize>,

    /// Thumbnail width in terminal cells
    #[arg(long)]
    pub image_width: Option<u16>,

    /// Thumbnail height in terminal cells
    #[arg(long)]
    pub image_height: Option<u16>,

    /// Horizontal padding around each thumbnail, in cells (minimum 1)
    #[arg(long)]
    pub padding_x: Option<u16>,

    /// Vertical padding around each thumbnail, in cells (minimum 1)
    #[arg(long)]
    pub padding_y: Option<u16>,

    /// Apply light theme variants instead of dark
    #[arg(long)]
    pub light: bool,

    /// Never shrink the terminal font to make the grid fit
    #[arg(long)]
    pub no_autoscale: bool,

    /// Keep the process alive after the grid exits
    #[arg(long)]
    pub hold: bool,

    /// Maximum external processes in flight (default: CPU threads - 1)
    #[arg(long)]
    pub concurrency: Option<usize>,
}
