//! Grid layout math.
//!
//! Pure coordinate computation, kept away from the terminal so it can be
//! tested. All units are terminal cells. A cell is one thumbnail slot:
//! image size plus padding on every side.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    /// Top-left corner of each slot, in slot order.
    pub slots: Vec<(u16, u16)>,
    pub cols: usize,
}

/// Wrapping flow layout: as many columns as fit, as many rows as needed for
/// `count` slots. Returns None when even one slot cannot be placed within
/// the containment invariant (`x + cell_w <= term_w`, `y + cell_h <= term_h`).
pub fn flow_layout(term: Size, cell: Size, count: usize) -> Option<Layout> {
    let cols = (term.width / cell.width.max(1)) as usize;
    if cols == 0 || cell.width > term.width || count == 0 {
        return None;
    }
    let rows_needed = count.div_ceil(cols);
    if rows_needed as u32 * cell.height as u32 > term.height as u32 {
        return None;
    }
    Some(place(term, cell, cols, count))
}

/// Fixed rows x cols grid for pagination. `count` is the number of slots on
/// the current page and may be smaller than the full grid.
pub fn fixed_layout(term: Size, cell: Size, rows: usize, cols: usize, count: usize) -> Option<Layout> {
    if rows == 0 || cols == 0 || count == 0 {
        return None;
    }
    if cols as u32 * cell.width as u32 > term.width as u32
        || rows as u32 * cell.height as u32 > term.height as u32
    {
        return None;
    }
    let count = count.min(rows * cols);
    Some(place(term, cell, cols, count))
}

fn place(term: Size, cell: Size, cols: usize, count: usize) -> Layout {
    // Center the grid horizontally; the invariant still holds since the
    // offset only shrinks the right margin.
    let x_offset = (term.width - cols.min(count) as u16 * cell.width) / 2;
    let slots = (0..count)
        .map(|i| {
            let x = x_offset + (i % cols) as u16 * cell.width;
            let y = (i / cols) as u16 * cell.height;
            (x, y)
        })
        .collect();
    Layout { slots, cols }
}

/// Number of pages needed to show `total` items in pages of `page_size`.
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// Index range of one page. Clamped to `total`.
pub fn page_bounds(page: usize, page_size: usize, total: usize) -> std::ops::Range<usize> {
    let start = (page * page_size).min(total);
    let end = (start + page_size).min(total);
    start..end
}
