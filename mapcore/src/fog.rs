//! Fog-of-war grid: one occlusion flag per grid square.
//!
//! The grid is stored as a flat row-major `Vec<bool>` with fixed dimensions
//! chosen at construction, so every row always has exactly `cols` cells.
//! `true` means the cell is occluded (hidden from the display view).
//!
//! Fog edits are recorded as cell diffs rather than full grid copies: the
//! gesture engine snapshots the grid at pointer-down, applies brush strokes,
//! and at pointer-up calls [`FogGrid::diff`] to get the compact list of
//! cells that actually flipped.

#[cfg(test)]
#[path = "fog_test.rs"]
mod fog_test;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_GRID_SIZE, MAX_FOG_CELLS};

/// Signed cell coordinates. May lie outside the grid; mutation clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    /// Column index (x axis).
    pub col: i64,
    /// Row index (y axis).
    pub row: i64,
}

impl CellPos {
    #[must_use]
    pub fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }
}

/// One cell whose occlusion flipped during an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChange {
    pub row: usize,
    pub col: usize,
    /// `true` when the edit revealed the cell, `false` when it hid it.
    pub was_revealed: bool,
}

/// Inclusive cell rectangle spanned by two corners, in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub top: i64,
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
}

impl CellRect {
    /// Normalize two arbitrary corners into a rectangle.
    #[must_use]
    pub fn spanning(a: CellPos, b: CellPos) -> Self {
        Self {
            top: a.row.min(b.row),
            left: a.col.min(b.col),
            bottom: a.row.max(b.row),
            right: a.col.max(b.col),
        }
    }

    /// Clip against a `rows × cols` grid. `None` if nothing overlaps.
    #[must_use]
    pub fn clip(&self, rows: usize, cols: usize) -> Option<(Range<usize>, Range<usize>)> {
        let row_range = clip_axis(self.top, self.bottom, rows)?;
        let col_range = clip_axis(self.left, self.right, cols)?;
        Some((row_range, col_range))
    }
}

fn clip_axis(lo: i64, hi: i64, len: usize) -> Option<Range<usize>> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = lo.max(0);
    let end = hi.saturating_add(1).min(len);
    if start >= end {
        return None;
    }
    Some(start as usize..end as usize)
}

/// Rectangular occlusion matrix, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FogRecord", into = "FogRecord")]
pub struct FogGrid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl FogGrid {
    /// Build a fully occluded grid covering an image.
    ///
    /// A zero cell size is clamped to [`DEFAULT_GRID_SIZE`] rather than
    /// dividing by zero; callers validate user input before getting here.
    ///
    /// # Errors
    ///
    /// [`FogShapeError::TooLarge`] when the grid would exceed [`MAX_FOG_CELLS`].
    pub fn initialize(image_width: u32, image_height: u32, cell_size: u32) -> Result<Self, FogShapeError> {
        let cell_size = if cell_size == 0 { DEFAULT_GRID_SIZE } else { cell_size };
        let rows = image_height.div_ceil(cell_size) as usize;
        let cols = image_width.div_ceil(cell_size) as usize;
        cell_count(rows, cols)?;
        Ok(Self::filled(rows, cols, true))
    }

    /// A `rows × cols` grid with every cell set to `occluded`. Callers have
    /// already bounded the size.
    #[must_use]
    pub(crate) fn filled(rows: usize, cols: usize, occluded: bool) -> Self {
        Self { rows, cols, cells: vec![occluded; rows * cols] }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `true` if the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    /// Occlusion of a cell, or `None` when out of range.
    #[must_use]
    pub fn is_occluded(&self, row: usize, col: usize) -> Option<bool> {
        self.index(row, col).map(|i| self.cells[i])
    }

    /// Set one cell. Returns false if the cell is out of range.
    pub fn set(&mut self, row: usize, col: usize, occluded: bool) -> bool {
        let Some(i) = self.index(row, col) else {
            return false;
        };
        self.cells[i] = occluded;
        true
    }

    /// One row as a slice, for read-only consumers such as renderers.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[bool]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.cells[start..start + self.cols])
    }

    /// Number of occluded cells.
    #[must_use]
    pub fn occluded_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Apply a square brush centered on `center`.
    ///
    /// The brush covers `[center - offset, center + brush - offset - 1]` on
    /// both axes with `offset = brush / 2`, so even sizes lean toward the
    /// lower indices. Cells outside the grid are skipped. Returns the number
    /// of in-range cells written.
    pub fn modify(&mut self, center: CellPos, brush_size: u32, reveal: bool) -> usize {
        let brush = i64::from(brush_size.max(1));
        let offset = brush / 2;
        let rect = CellRect {
            top: center.row - offset,
            left: center.col - offset,
            bottom: center.row + brush - offset - 1,
            right: center.col + brush - offset - 1,
        };
        self.fill_rect(rect, reveal)
    }

    /// Set every in-range cell of `rect` to `!reveal`. Returns cells written.
    pub fn fill_rect(&mut self, rect: CellRect, reveal: bool) -> usize {
        let Some((rows, cols)) = rect.clip(self.rows, self.cols) else {
            return 0;
        };
        let mut written = 0;
        for row in rows {
            for col in cols.clone() {
                let i = row * self.cols + col;
                self.cells[i] = !reveal;
                written += 1;
            }
        }
        written
    }

    /// Row-major occlusion of every in-range cell of `rect`.
    #[must_use]
    pub fn capture_rect(&self, rect: CellRect) -> Vec<bool> {
        let Some((rows, cols)) = rect.clip(self.rows, self.cols) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(rows.len() * cols.len());
        for row in rows {
            let start = row * self.cols;
            out.extend_from_slice(&self.cells[start + cols.start..start + cols.end]);
        }
        out
    }

    /// Write back values produced by [`FogGrid::capture_rect`] for the same rect.
    pub fn restore_rect(&mut self, rect: CellRect, values: &[bool]) {
        let Some((rows, cols)) = rect.clip(self.rows, self.cols) else {
            return;
        };
        let mut source = values.iter();
        for row in rows {
            for col in cols.clone() {
                let Some(value) = source.next() else {
                    return;
                };
                let i = row * self.cols + col;
                self.cells[i] = *value;
            }
        }
    }

    /// Set every cell to `occluded`.
    pub fn fill(&mut self, occluded: bool) {
        self.cells.fill(occluded);
    }

    /// Cells whose occlusion differs between `before` and `after`.
    ///
    /// Grids of different shapes are compared over their shared top-left
    /// region only.
    #[must_use]
    pub fn diff(before: &FogGrid, after: &FogGrid) -> Vec<CellChange> {
        let rows = before.rows.min(after.rows);
        let cols = before.cols.min(after.cols);
        let mut changes = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let was = before.cells[row * before.cols + col];
                let now = after.cells[row * after.cols + col];
                if was != now {
                    changes.push(CellChange { row, col, was_revealed: !now });
                }
            }
        }
        changes
    }

    /// Replay a diff forward (`true`) or backward (`false`). Out-of-range
    /// cells are skipped.
    pub fn apply_changes(&mut self, changes: &[CellChange], forward: bool) {
        for change in changes {
            let occluded = if forward { !change.was_revealed } else { change.was_revealed };
            self.set(change.row, change.col, occluded);
        }
    }

    /// Copy into a grid of new dimensions. Overlapping cells keep their
    /// value, new cells start occluded.
    #[must_use]
    pub(crate) fn resized(&self, rows: usize, cols: usize) -> FogGrid {
        let mut out = FogGrid::filled(rows, cols, true);
        for row in 0..rows.min(self.rows) {
            for col in 0..cols.min(self.cols) {
                out.cells[row * cols + col] = self.cells[row * self.cols + col];
            }
        }
        out
    }
}

// =============================================================================
// SERIALIZED FORM
// =============================================================================

/// Nested-row form used in persisted records and sync payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FogRecord {
    pub cells: Vec<Vec<bool>>,
    pub rows: usize,
    pub cols: usize,
}

/// Rows times cols, if within [`MAX_FOG_CELLS`].
fn cell_count(rows: usize, cols: usize) -> Result<usize, FogShapeError> {
    rows.checked_mul(cols).filter(|&n| n <= MAX_FOG_CELLS).ok_or(FogShapeError::TooLarge { rows, cols })
}

/// Rejected fog dimensions or nested-row payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FogShapeError {
    #[error("fog of {rows}x{cols} cells is too large")]
    TooLarge { rows: usize, cols: usize },
    #[error("fog declares {expected} rows but carries {actual}")]
    RowCount { expected: usize, actual: usize },
    #[error("fog row {row} has {actual} cells, expected {expected}")]
    RowWidth { row: usize, expected: usize, actual: usize },
}

impl TryFrom<FogRecord> for FogGrid {
    type Error = FogShapeError;

    fn try_from(record: FogRecord) -> Result<Self, Self::Error> {
        if record.cells.len() != record.rows {
            return Err(FogShapeError::RowCount { expected: record.rows, actual: record.cells.len() });
        }
        let mut cells = Vec::with_capacity(cell_count(record.rows, record.cols)?);
        for (row, values) in record.cells.into_iter().enumerate() {
            if values.len() != record.cols {
                return Err(FogShapeError::RowWidth { row, expected: record.cols, actual: values.len() });
            }
            cells.extend(values);
        }
        Ok(Self { rows: record.rows, cols: record.cols, cells })
    }
}

impl From<FogGrid> for FogRecord {
    fn from(grid: FogGrid) -> Self {
        let cells = if grid.cols == 0 {
            vec![Vec::new(); grid.rows]
        } else {
            grid.cells.chunks(grid.cols).map(<[bool]>::to_vec).collect()
        };
        Self { cells, rows: grid.rows, cols: grid.cols }
    }
}
