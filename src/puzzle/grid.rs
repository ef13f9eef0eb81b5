//! Drag-and-drop over a fixed-size grid
//!
//! A move exchanges the two cells involved; nothing shifts. Hit testing
//! follows the layout: `spacing` of padding around the grid and between
//! cells, cells of `cell_width` x `cell_height`.

use crate::core::error::{QuestError, Result};
use crate::puzzle::layout::GridLayout;

/// A drag from one cell index to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEvent {
    pub from: usize,
    pub to: usize,
}

impl MoveEvent {
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// Swap `items[from]` and `items[to]` in place
pub fn apply_move<T>(items: &mut [T], event: MoveEvent) -> Result<()> {
    let len = items.len();
    if event.from >= len || event.to >= len {
        return Err(QuestError::InvalidOrder(format!(
            "move {} -> {} out of range for {} items",
            event.from, event.to, len
        )));
    }
    items.swap(event.from, event.to);
    Ok(())
}

/// New sequence with the move applied
pub fn moved<T: Clone>(items: &[T], event: MoveEvent) -> Result<Vec<T>> {
    let mut next = items.to_vec();
    apply_move(&mut next, event)?;
    Ok(next)
}

/// Geometry of a laid-out board for pointer hit testing
#[derive(Debug, Clone, Copy)]
pub struct ReorderableGrid {
    layout: GridLayout,
    len: usize,
}

impl ReorderableGrid {
    pub fn new(layout: GridLayout, len: usize) -> Self {
        Self { layout, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell index under `(x, y)`, or None in gutters and outside the grid
    pub fn index_at(&self, x: f32, y: f32) -> Option<usize> {
        let col = axis_cell(x, self.layout.cell_width, self.layout.spacing, self.layout.columns)?;
        let row = axis_cell(y, self.layout.cell_height, self.layout.spacing, self.layout.rows)?;
        let index = row as usize * self.layout.columns as usize + col as usize;
        (index < self.len).then_some(index)
    }

    /// Top-left corner of cell `index`
    pub fn cell_origin(&self, index: usize) -> Option<(f32, f32)> {
        if index >= self.len {
            return None;
        }
        let columns = self.layout.columns.max(1) as usize;
        let col = (index % columns) as f32;
        let row = (index / columns) as f32;
        let s = self.layout.spacing;
        Some((
            s + col * (self.layout.cell_width + s),
            s + row * (self.layout.cell_height + s),
        ))
    }

    /// Turn a drag gesture into a move; None if it starts or ends off a
    /// cell, or drops onto its own cell
    pub fn drag(&self, start: (f32, f32), end: (f32, f32)) -> Option<MoveEvent> {
        let from = self.index_at(start.0, start.1)?;
        let to = self.index_at(end.0, end.1)?;
        (from != to).then_some(MoveEvent::new(from, to))
    }
}

fn axis_cell(pos: f32, cell: f32, spacing: f32, count: u32) -> Option<u32> {
    if !pos.is_finite() || cell <= 0.0 {
        return None;
    }
    let offset = pos - spacing;
    if offset < 0.0 {
        return None;
    }
    let stride = cell + spacing;
    let index = (offset / stride).floor();
    if index >= count as f32 || offset - index * stride >= cell {
        return None;
    }
    Some(index as u32)
}
