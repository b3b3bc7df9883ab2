//! Reversible operations and the bounded undo/redo history.
//!
//! Operations are plain data: each variant carries exactly what is needed to
//! move `AppState` forward and back, and [`Operation::apply`] /
//! [`Operation::revert`] dispatch on the variant. Nothing here holds a
//! reference into the state, so operations can be cloned, logged, or
//! serialized freely.
//!
//! Each operation touches a fixed set of fields and passes every other field
//! through untouched:
//!
//! | Variant | Touches |
//! |---------|---------|
//! | `FogChange` | listed fog cells |
//! | `BlockChange` | fog cells inside the rectangle |
//! | `FogReset` / `FogClear` | whole fog grid |
//! | `DrawingAdd` / `DrawingsClear` | drawing list |

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::consts::HISTORY_CAPACITY;
use crate::doc::{AppState, Drawing};
use crate::fog::{CellChange, CellRect, FogGrid};

/// An invertible edit to `AppState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    /// Cells flipped during one brush gesture.
    FogChange { cells: Vec<CellChange> },
    /// A new drawing appended to the set.
    DrawingAdd { drawing: Drawing },
    /// The drawing set emptied; `cleared` is the exact prior list.
    DrawingsClear { cleared: Vec<Drawing> },
    /// Fog set back to fully occluded; `previous` is the grid before.
    FogReset { previous: FogGrid },
    /// Fog fully revealed; `previous` is the grid before.
    FogClear { previous: FogGrid },
    /// Rectangle revealed or hidden; `previous` holds the prior occlusion of
    /// each in-range cell, row-major.
    BlockChange { rect: CellRect, reveal: bool, previous: Vec<bool> },
}

impl Operation {
    /// Short stable name, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FogChange { .. } => "fog_change",
            Self::DrawingAdd { .. } => "drawing_add",
            Self::DrawingsClear { .. } => "drawings_clear",
            Self::FogReset { .. } => "fog_reset",
            Self::FogClear { .. } => "fog_clear",
            Self::BlockChange { .. } => "block_change",
        }
    }

    /// Build a `BlockChange` by capturing the rectangle's current fog.
    #[must_use]
    pub fn block_change(fog: &FogGrid, rect: CellRect, reveal: bool) -> Self {
        Self::BlockChange { rect, reveal, previous: fog.capture_rect(rect) }
    }

    /// Build a `FogReset` capturing the current grid.
    #[must_use]
    pub fn fog_reset(fog: &FogGrid) -> Self {
        Self::FogReset { previous: fog.clone() }
    }

    /// Build a `FogClear` capturing the current grid.
    #[must_use]
    pub fn fog_clear(fog: &FogGrid) -> Self {
        Self::FogClear { previous: fog.clone() }
    }

    /// Build a `DrawingsClear` capturing the current drawing list.
    #[must_use]
    pub fn drawings_clear(drawings: &[Drawing]) -> Self {
        Self::DrawingsClear { cleared: drawings.to_vec() }
    }

    /// Apply the forward transform.
    pub fn apply(&self, state: &mut AppState) {
        match self {
            Self::FogChange { cells } => state.fog.apply_changes(cells, true),
            Self::DrawingAdd { drawing } => state.drawings.push(drawing.clone()),
            Self::DrawingsClear { .. } => state.drawings.clear(),
            Self::FogReset { .. } => state.fog.fill(true),
            Self::FogClear { .. } => state.fog.fill(false),
            Self::BlockChange { rect, reveal, .. } => {
                state.fog.fill_rect(*rect, *reveal);
            }
        }
    }

    /// Apply the inverse transform.
    pub fn revert(&self, state: &mut AppState) {
        match self {
            Self::FogChange { cells } => state.fog.apply_changes(cells, false),
            Self::DrawingAdd { drawing } => state.drawings.retain(|d| d.id != drawing.id),
            Self::DrawingsClear { cleared } => state.drawings.clone_from(cleared),
            Self::FogReset { previous } | Self::FogClear { previous } => state.fog.clone_from(previous),
            Self::BlockChange { rect, previous, .. } => state.fog.restore_rect(*rect, previous),
        }
    }
}

/// Bounded undo/redo stacks. Oldest entries fall off when full.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Operation>,
    redo: VecDeque<Operation>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// History holding at most `capacity` entries per stack (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { undo: VecDeque::with_capacity(capacity), redo: VecDeque::with_capacity(capacity), capacity }
    }

    /// Record an already-applied operation. Discards the redo branch.
    pub fn push(&mut self, op: Operation) {
        self.redo.clear();
        push_bounded(&mut self.undo, op, self.capacity);
    }

    /// Revert the most recent operation. Returns it, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, state: &mut AppState) -> Option<&Operation> {
        let op = self.undo.pop_back()?;
        op.revert(state);
        push_bounded(&mut self.redo, op, self.capacity);
        self.redo.back()
    }

    /// Re-apply the most recently undone operation. Returns it, or `None`
    /// when there is nothing to redo.
    pub fn redo(&mut self, state: &mut AppState) -> Option<&Operation> {
        let op = self.redo.pop_back()?;
        op.apply(state);
        push_bounded(&mut self.undo, op, self.capacity);
        self.undo.back()
    }

    /// Forget everything. Called on map load.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// The operation the next undo would revert.
    #[must_use]
    pub fn last_done(&self) -> Option<&Operation> {
        self.undo.back()
    }

    /// The operation the next redo would re-apply.
    #[must_use]
    pub fn last_undone(&self) -> Option<&Operation> {
        self.redo.back()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn push_bounded(stack: &mut VecDeque<Operation>, op: Operation, capacity: usize) {
    if stack.len() >= capacity {
        stack.pop_front();
    }
    stack.push_back(op);
}
