//! Interactive thumbnail grid.
//!
//! The UI walks an explicit state machine:
//! Initializing -> LayingOut -> Interactive -> Exited.
//!
//! Thumbnails are drawn by an external terminal-graphics tool (kitty's icat
//! by default) at coordinates computed in `grid`; this module owns terminal
//! state (raw mode, alternate screen, cursor), the selection border, the
//! font-shrinking growth loop, and key dispatch. Navigation and pagination
//! state is kept in pure structs so it can be tested without a terminal.

use std::io::{Write, stdout};
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{cursor, queue};
use tokio::process::Command;

use crate::error::WallgridError;
use crate::grid::{self, Layout, Size};
use crate::repository::Wallpaper;

/// What the orchestrator does when the user confirms a slot.
#[async_trait]
pub trait SelectionHandler {
    async fn handle(&self, wallpaper: &Wallpaper) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct UiOptions {
    /// Rendered image size in terminal cells.
    pub image: Size,
    /// Padding around each image, in cells per side.
    pub padding: Size,
    /// Fixed (rows, cols) grid when pagination is on; None flows everything
    /// onto one screen.
    pub pagination: Option<(usize, usize)>,
    /// Whether the growth sub-loop may shrink the terminal font.
    pub autoscale: bool,
    /// Image placement tool, e.g. "kitten icat".
    pub placement_command: String,
    /// Font size adjustment tool, e.g. "kitten @ set-font-size".
    pub font_command: String,
}

impl UiOptions {
    fn cell(&self) -> Size {
        Size::new(
            self.image.width + 2 * self.padding.width,
            self.image.height + 2 * self.padding.height,
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum UiState {
    Initializing,
    LayingOut,
    Interactive,
    Exited,
}

/// Pagination and selection state. Selection always indexes into the
/// currently visible slice.
#[derive(Debug)]
pub struct PageState {
    total: usize,
    page_size: Option<usize>,
    page: usize,
    pub selection: usize,
}

impl PageState {
    pub fn new(total: usize, page_size: Option<usize>) -> Self {
        Self { total, page_size, page: 0, selection: 0 }
    }

    pub fn visible_range(&self) -> Range<usize> {
        match self.page_size {
            Some(size) => grid::page_bounds(self.page, size, self.total),
            None => 0..self.total,
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible_range().len()
    }

    /// Absolute index of the current selection into the full list.
    pub fn current_index(&self) -> usize {
        self.visible_range().start + self.selection
    }

    fn pages(&self) -> usize {
        match self.page_size {
            Some(size) => grid::page_count(self.total, size),
            None => 1,
        }
    }

    /// Returns true when the visible page changed (full redraw needed).
    pub fn move_right(&mut self) -> bool {
        if self.selection + 1 < self.visible_count() {
            self.selection += 1;
            return false;
        }
        if self.pages() > 1 {
            self.page = (self.page + 1) % self.pages();
            self.selection = 0;
            return true;
        }
        self.selection = 0;
        false
    }

    pub fn move_left(&mut self) -> bool {
        if self.selection > 0 {
            self.selection -= 1;
            return false;
        }
        if self.pages() > 1 {
            self.page = (self.page + self.pages() - 1) % self.pages();
            self.selection = self.visible_count() - 1;
            return true;
        }
        self.selection = self.visible_count() - 1;
        false
    }

    pub fn page_forward(&mut self) -> bool {
        if self.pages() <= 1 {
            return false;
        }
        self.page = (self.page + 1) % self.pages();
        self.selection = 0;
        true
    }

    pub fn page_back(&mut self) -> bool {
        if self.pages() <= 1 {
            return false;
        }
        self.page = (self.page + self.pages() - 1) % self.pages();
        self.selection = self.visible_count() - 1;
        true
    }
}

/// Moves the selection to the nearest slot above/below sharing the same
/// x-coordinate. Stays put when no such slot exists.
pub fn move_vertical(slots: &[(u16, u16)], selection: usize, up: bool) -> usize {
    let (x, _) = slots[selection];
    if up {
        slots[..selection]
            .iter()
            .rposition(|&(sx, _)| sx == x)
            .unwrap_or(selection)
    } else {
        slots[selection + 1..]
            .iter()
            .position(|&(sx, _)| sx == x)
            .map(|offset| selection + 1 + offset)
            .unwrap_or(selection)
    }
}

pub struct GridUi<'a, H: SelectionHandler> {
    wallpapers: &'a [Wallpaper],
    thumb_dir: PathBuf,
    options: UiOptions,
    handler: &'a H,
    term: Size,
    layout: Option<Layout>,
    page: PageState,
    font_steps: u32,
}

impl<'a, H: SelectionHandler> GridUi<'a, H> {
    pub fn new(
        wallpapers: &'a [Wallpaper],
        thumb_dir: PathBuf,
        options: UiOptions,
        handler: &'a H,
    ) -> Self {
        let page_size = options.pagination.map(|(rows, cols)| rows * cols);
        Self {
            wallpapers,
            thumb_dir,
            options,
            handler,
            term: Size::new(0, 0),
            layout: None,
            page: PageState::new(wallpapers.len(), page_size),
            font_steps: 0,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut state = UiState::Initializing;
        let result = loop {
            state = match state {
                UiState::Initializing => {
                    let (w, h) = terminal::size().context("failed to read terminal size")?;
                    self.term = Size::new(w, h);
                    UiState::LayingOut
                }
                UiState::LayingOut => match self.lay_out_with_growth().await {
                    Ok(()) => UiState::Interactive,
                    Err(e) => break Err(e),
                },
                UiState::Interactive => match self.interact().await {
                    Ok(()) => UiState::Exited,
                    Err(e) => break Err(e),
                },
                UiState::Exited => break Ok(()),
            };
        };
        // Terminal state is restored on both paths out of the loop.
        self.restore().await?;
        result
    }

    fn compute_layout(&self, count: usize) -> Option<Layout> {
        let cell = self.options.cell();
        match self.options.pagination {
            Some((rows, cols)) => grid::fixed_layout(self.term, cell, rows, cols, count),
            None => grid::flow_layout(self.term, cell, count),
        }
    }

    /// The growth sub-loop: shrink the terminal font until the full page
    /// fits, give up when growth is disabled or stops changing the size.
    async fn lay_out_with_growth(&mut self) -> Result<()> {
        let full_page = match self.options.pagination {
            Some((rows, cols)) => (rows * cols).min(self.wallpapers.len()),
            None => self.wallpapers.len(),
        };

        loop {
            if let Some(layout) = self.compute_layout(full_page) {
                self.layout = Some(layout);
                return Ok(());
            }
            if !self.options.autoscale {
                return Err(self.too_small());
            }

            self.adjust_font(-1).await?;
            self.font_steps += 1;
            let (w, h) = terminal::size().context("failed to re-read terminal size")?;
            let grown = Size::new(w, h);
            if grown == self.term {
                // Growth converged without fitting; no point retrying.
                return Err(self.too_small());
            }
            self.term = grown;
        }
    }

    fn too_small(&self) -> anyhow::Error {
        let cell = self.options.cell();
        WallgridError::InsufficientScreenSize {
            term_w: self.term.width,
            term_h: self.term.height,
            cell_w: cell.width,
            cell_h: cell.height,
        }
        .into()
    }

    async fn interact(&mut self) -> Result<()> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = stdout();
        queue!(out, EnterAlternateScreen, cursor::Hide)?;
        out.flush()?;

        self.redraw().await?;

        loop {
            if !event::poll(Duration::from_millis(250))? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Left | KeyCode::Char('h') => {
                    let page_changed = self.page.move_left();
                    self.refresh(page_changed).await?;
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    let page_changed = self.page.move_right();
                    self.refresh(page_changed).await?;
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_vertical(true)?;
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_vertical(false)?;
                }
                KeyCode::PageDown | KeyCode::Char('n') => {
                    if self.page.page_forward() {
                        self.redraw().await?;
                    }
                }
                KeyCode::PageUp | KeyCode::Char('p') => {
                    if self.page.page_back() {
                        self.redraw().await?;
                    }
                }
                KeyCode::Enter => {
                    let wallpaper = &self.wallpapers[self.page.current_index()];
                    // Input handling resumes only once the handler is done.
                    self.handler.handle(wallpaper).await?;
                }
                _ => {}
            }
        }
    }

    fn move_selection_vertical(&mut self, up: bool) -> Result<()> {
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        let next = move_vertical(&layout.slots, self.page.selection, up);
        if next != self.page.selection {
            self.move_border(self.page.selection, next)?;
            self.page.selection = next;
        }
        Ok(())
    }

    async fn refresh(&mut self, page_changed: bool) -> Result<()> {
        if page_changed {
            self.redraw().await
        } else {
            // Same page: only the border moved. The previous selection is
            // whatever slot the border was on before this key.
            self.redraw_border_only()
        }
    }

    fn redraw_border_only(&mut self) -> Result<()> {
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        let selected = self.page.selection;
        let slots = layout.slots.clone();
        let mut out = stdout();
        for (i, &slot) in slots.iter().enumerate() {
            self.draw_border_at(&mut out, slot, i == selected)?;
        }
        out.flush()?;
        Ok(())
    }

    fn move_border(&self, from: usize, to: usize) -> Result<()> {
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        let mut out = stdout();
        self.draw_border_at(&mut out, layout.slots[from], false)?;
        self.draw_border_at(&mut out, layout.slots[to], true)?;
        out.flush()?;
        Ok(())
    }

    /// Full page render: clear graphics and text, place every visible
    /// thumbnail, then draw the selection border.
    async fn redraw(&mut self) -> Result<()> {
        let range = self.page.visible_range();
        let visible = &self.wallpapers[range];
        let layout = self
            .compute_layout(visible.len())
            .ok_or_else(|| self.too_small())?;
        let slots = layout.slots.clone();
        self.layout = Some(layout);

        self.clear_graphics().await?;
        let mut out = stdout();
        queue!(out, Clear(ClearType::All))?;
        out.flush()?;

        for (wallpaper, &slot) in visible.iter().zip(&slots) {
            self.place_image(wallpaper, slot).await?;
        }

        self.page.selection = self.page.selection.min(visible.len().saturating_sub(1));
        self.redraw_border_only()
    }

    async fn place_image(&self, wallpaper: &Wallpaper, slot: (u16, u16)) -> Result<()> {
        let pad = self.options.padding;
        let image = self.options.image;
        let place = format!(
            "{}x{}@{}x{}",
            image.width,
            image.height,
            slot.0 + pad.width,
            slot.1 + pad.height
        );
        let thumb = self.thumb_dir.join(&wallpaper.unique_id);

        let mut cmd = tool_command(&self.options.placement_command)?;
        let status = cmd
            .arg("--place")
            .arg(&place)
            .arg(&thumb)
            .status()
            .await
            .map_err(|e| WallgridError::ExternalTool {
                tool: self.options.placement_command.clone(),
                detail: format!("could not launch: {e}"),
            })?;
        if !status.success() {
            return Err(WallgridError::ExternalTool {
                tool: self.options.placement_command.clone(),
                detail: format!("placing {} exited with {status}", thumb.display()),
            }
            .into());
        }
        Ok(())
    }

    async fn clear_graphics(&self) -> Result<()> {
        let mut cmd = tool_command(&self.options.placement_command)?;
        // Best effort; a terminal without graphics to clear is fine.
        let _ = cmd.arg("--clear").status().await;
        Ok(())
    }

    fn draw_border_at(
        &self,
        out: &mut impl Write,
        slot: (u16, u16),
        active: bool,
    ) -> Result<()> {
        let pad = self.options.padding;
        let image = self.options.image;
        if pad.width == 0 || pad.height == 0 {
            return Ok(());
        }

        // Border ring sits one cell outside the image, inside the padding.
        let left = slot.0 + pad.width - 1;
        let top = slot.1 + pad.height - 1;
        let right = left + image.width + 1;
        let bottom = top + image.height + 1;

        let (h, v, tl, tr, bl, br) = if active {
            ('─', '│', '┌', '┐', '└', '┘')
        } else {
            (' ', ' ', ' ', ' ', ' ', ' ')
        };

        queue!(out, cursor::MoveTo(left, top), Print(tl))?;
        queue!(out, cursor::MoveTo(right, top), Print(tr))?;
        queue!(out, cursor::MoveTo(left, bottom), Print(bl))?;
        queue!(out, cursor::MoveTo(right, bottom), Print(br))?;
        for x in left + 1..right {
            queue!(out, cursor::MoveTo(x, top), Print(h))?;
            queue!(out, cursor::MoveTo(x, bottom), Print(h))?;
        }
        for y in top + 1..bottom {
            queue!(out, cursor::MoveTo(left, y), Print(v))?;
            queue!(out, cursor::MoveTo(right, y), Print(v))?;
        }
        Ok(())
    }

    async fn adjust_font(&self, step: i32) -> Result<()> {
        let mut cmd = tool_command(&self.options.font_command)?;
        let status = cmd
            .arg("--")
            .arg(step.to_string())
            .status()
            .await
            .map_err(|e| WallgridError::ExternalTool {
                tool: self.options.font_command.clone(),
                detail: format!("could not launch: {e}"),
            })?;
        if !status.success() {
            return Err(WallgridError::ExternalTool {
                tool: self.options.font_command.clone(),
                detail: format!("font adjustment exited with {status}"),
            }
            .into());
        }
        Ok(())
    }

    async fn restore(&mut self) -> Result<()> {
        let _ = self.clear_graphics().await;
        if self.font_steps > 0 {
            // 0 resets the override back to the configured size.
            let _ = self.adjust_font(0).await;
            self.font_steps = 0;
        }
        let mut out = stdout();
        queue!(out, cursor::Show, LeaveAlternateScreen)?;
        out.flush()?;
        disable_raw_mode().context("failed to disable raw mode")?;
        Ok(())
    }
}

/// Splits a configured tool string like "kitten icat" into a Command.
fn tool_command(tool: &str) -> Result<Command> {
    let mut parts = tool.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("empty tool command in configuration"))?;
    let mut cmd = Command::new(program);
    cmd.args(parts);
    Ok(cmd)
}
