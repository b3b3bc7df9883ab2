//! Controller-side engine: every user-visible mutation goes through here.
//!
//! `EngineCore` owns the authoritative `AppState`, the undo/redo history, the
//! calibration search, and the gesture in flight. Each entry point returns a
//! list of [`Action`]s telling the host what to do next (broadcast, save,
//! redraw). The host never mutates `AppState` directly.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::calibration::{Feedback, GridCalibration, Step};
use crate::camera::Point;
use crate::consts::{DEFAULT_BRUSH_SIZE, DEFAULT_DRAW_COLOR, DEFAULT_DRAW_WIDTH};
use crate::doc::{AppState, Drawing, MapError, validate_grid_size};
use crate::fog::{CellPos, CellRect, FogGrid};
use crate::history::{History, Operation};
use crate::input::{Button, InputState, Modifiers, Tool, WheelDelta};
use crate::record::{DecodedImage, SavedMapState, session_for};
use crate::viewport::VisibleRect;

/// Wheel zoom step per notch.
const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Actions returned from engine calls for the host to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Durable state changed: broadcast it and schedule a save.
    StateChanged,
    /// Only transient state changed (laser trail, fog mid-gesture): broadcast, don't save.
    Transient,
    /// Controller-only redraw; nothing to broadcast.
    RenderNeeded,
}

/// Core engine state.
pub struct EngineCore {
    pub state: AppState,
    pub history: History,
    pub calibration: GridCalibration,
    pub input: InputState,
    pub tool: Tool,
    /// Fog brush side length in cells. Always >= 1.
    pub brush_size: u32,
    pub draw_color: String,
    pub draw_width: f64,
    /// Latest rectangle reported by the display view. Never persisted.
    pub player_viewport: Option<VisibleRect>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            state: AppState::new(),
            history: History::new(),
            calibration: GridCalibration::Inactive,
            input: InputState::Idle,
            tool: Tool::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            draw_color: DEFAULT_DRAW_COLOR.to_owned(),
            draw_width: DEFAULT_DRAW_WIDTH,
            player_viewport: None,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose history holds `capacity` entries per stack.
    #[must_use]
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self { history: History::with_capacity(capacity), ..Self::default() }
    }

    // --- Map lifecycle ---

    /// Replace the session with a freshly decoded map, merged with its saved
    /// record when there is one. History and calibration start over.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Fog`] when the image is too large to fog; the
    /// current session is kept.
    pub fn load_map(&mut self, image: &DecodedImage, saved: Option<SavedMapState>) -> Result<Vec<Action>, MapError> {
        self.state = session_for(image, saved)?;
        self.history.clear();
        self.calibration = GridCalibration::Inactive;
        self.input = InputState::Idle;
        self.player_viewport = None;
        Ok(vec![Action::StateChanged])
    }

    // --- Tools ---

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.max(1);
    }

    pub fn set_draw_style(&mut self, color: impl Into<String>, width: f64) {
        self.draw_color = color.into();
        if width.is_finite() && width > 0.0 {
            self.draw_width = width;
        }
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if self.input.is_active() {
            return Vec::new();
        }
        let tool = match button {
            Button::Primary => self.tool,
            Button::Middle => Tool::Pan,
            Button::Secondary => return Vec::new(),
        };
        if tool == Tool::Pan {
            self.input = InputState::Panning { last_screen: screen_pt };
            return Vec::new();
        }
        if !self.state.has_image() {
            return Vec::new();
        }

        let map_pt = self.state.view.screen_to_map(screen_pt);
        let cell = self.state.map.pixel_to_cell(map_pt);
        match tool {
            Tool::Reveal | Tool::Hide => {
                let reveal = tool == Tool::Reveal;
                let before = self.state.fog.clone();
                self.state.fog.modify(cell, self.brush_size, reveal);
                self.input = InputState::PaintingFog { before, reveal, last_cell: cell };
                vec![Action::Transient]
            }
            Tool::Block => {
                self.input = InputState::DraggingBlock { anchor: cell, current: cell, reveal: !modifiers.shift };
                vec![Action::RenderNeeded]
            }
            Tool::Draw => {
                self.input = InputState::Drawing { points: vec![map_pt] };
                vec![Action::RenderNeeded]
            }
            Tool::Laser => {
                self.state.laser = vec![map_pt];
                self.input = InputState::Lasering;
                vec![Action::Transient]
            }
            Tool::Pan => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let map_pt = self.state.view.screen_to_map(screen_pt);
        let cell = self.state.map.pixel_to_cell(map_pt);
        match &mut self.input {
            InputState::Idle => Vec::new(),
            InputState::PaintingFog { reveal, last_cell, .. } => {
                if *last_cell == cell {
                    return Vec::new();
                }
                *last_cell = cell;
                self.state.fog.modify(cell, self.brush_size, *reveal);
                vec![Action::Transient]
            }
            InputState::DraggingBlock { current, .. } => {
                *current = cell;
                vec![Action::RenderNeeded]
            }
            InputState::Drawing { points } => {
                points.push(map_pt);
                vec![Action::RenderNeeded]
            }
            InputState::Lasering => {
                self.state.laser.push(map_pt);
                vec![Action::Transient]
            }
            InputState::Panning { last_screen } => {
                self.state.view.pan_by(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                *last_screen = screen_pt;
                vec![Action::RenderNeeded]
            }
        }
    }

    /// Finish the gesture. Fog brushing and block drags commit one history
    /// entry; a stroke with at least two points becomes a drawing.
    pub fn on_pointer_up(&mut self, screen_pt: Point) -> Vec<Action> {
        let map_pt = self.state.view.screen_to_map(screen_pt);
        match std::mem::take(&mut self.input) {
            InputState::Idle => Vec::new(),
            InputState::PaintingFog { before, .. } => {
                let cells = FogGrid::diff(&before, &self.state.fog);
                if cells.is_empty() {
                    return Vec::new();
                }
                self.history.push(Operation::FogChange { cells });
                vec![Action::StateChanged]
            }
            InputState::DraggingBlock { anchor, reveal, .. } => {
                let current = self.state.map.pixel_to_cell(map_pt);
                let rect = CellRect::spanning(anchor, current);
                if rect.clip(self.state.fog.rows(), self.state.fog.cols()).is_none() {
                    return vec![Action::RenderNeeded];
                }
                let op = Operation::block_change(&self.state.fog, rect, reveal);
                self.commit(op)
            }
            InputState::Drawing { mut points } => {
                if points.last() != Some(&map_pt) {
                    points.push(map_pt);
                }
                if points.len() < 2 {
                    return vec![Action::RenderNeeded];
                }
                let drawing = Drawing::new(points, self.draw_color.clone(), self.draw_width);
                self.commit(Operation::DrawingAdd { drawing })
            }
            InputState::Lasering => {
                self.state.laser.clear();
                vec![Action::Transient]
            }
            InputState::Panning { .. } => vec![Action::StateChanged],
        }
    }

    /// Abandon the gesture without recording anything. A half-painted fog
    /// stroke is rolled back to the grid captured at pointer-down.
    pub fn cancel_gesture(&mut self) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::Idle => Vec::new(),
            InputState::PaintingFog { before, .. } => {
                self.state.fog = before;
                vec![Action::Transient]
            }
            InputState::Lasering => {
                self.state.laser.clear();
                vec![Action::Transient]
            }
            InputState::DraggingBlock { .. } | InputState::Drawing { .. } | InputState::Panning { .. } => {
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta) -> Vec<Action> {
        if delta.dy == 0.0 || !delta.dy.is_finite() {
            return Vec::new();
        }
        let factor = if delta.dy < 0.0 { WHEEL_ZOOM_STEP } else { 1.0 / WHEEL_ZOOM_STEP };
        self.state.view.zoom_at(screen_pt, factor);
        vec![Action::StateChanged]
    }

    // --- History ---

    /// Apply `op`, record it, and report a durable change.
    fn commit(&mut self, op: Operation) -> Vec<Action> {
        op.apply(&mut self.state);
        self.history.push(op);
        vec![Action::StateChanged]
    }

    /// Undo the last operation. Refused while a gesture is in flight.
    pub fn undo(&mut self) -> Vec<Action> {
        if self.input.is_active() || self.history.undo(&mut self.state).is_none() {
            return Vec::new();
        }
        vec![Action::StateChanged]
    }

    /// Redo the last undone operation. Refused while a gesture is in flight.
    pub fn redo(&mut self) -> Vec<Action> {
        if self.input.is_active() || self.history.redo(&mut self.state).is_none() {
            return Vec::new();
        }
        vec![Action::StateChanged]
    }

    // --- Whole-map edits ---
    //
    // Refused while a gesture is in flight, like undo.

    pub fn clear_drawings(&mut self) -> Vec<Action> {
        if self.input.is_active() || self.state.drawings.is_empty() {
            return Vec::new();
        }
        let op = Operation::drawings_clear(&self.state.drawings);
        self.commit(op)
    }

    /// Cover the whole map in fog.
    pub fn reset_fog(&mut self) -> Vec<Action> {
        if self.input.is_active() || self.state.fog.is_empty() {
            return Vec::new();
        }
        let op = Operation::fog_reset(&self.state.fog);
        self.commit(op)
    }

    /// Remove all fog.
    pub fn clear_fog(&mut self) -> Vec<Action> {
        if self.input.is_active() || self.state.fog.is_empty() {
            return Vec::new();
        }
        let op = Operation::fog_clear(&self.state.fog);
        self.commit(op)
    }

    // --- Grid settings ---

    /// Change the cell size. Fog is rebuilt and history cleared, since
    /// recorded cell indices no longer name the same squares.
    ///
    /// # Errors
    ///
    /// [`MapError::InvalidGridSize`] for bad input, [`MapError::CalibrationActive`]
    /// while a calibration search owns the grid size, [`MapError::GestureActive`]
    /// mid-gesture, and [`MapError::Fog`] if the map would need too many cells.
    pub fn set_grid_size(&mut self, raw: f64) -> Result<Vec<Action>, MapError> {
        if self.calibration.is_active() {
            return Err(MapError::CalibrationActive);
        }
        if self.input.is_active() {
            return Err(MapError::GestureActive);
        }
        let size = validate_grid_size(raw)?;
        if !self.state.set_grid_size(size)? {
            return Ok(Vec::new());
        }
        self.history.clear();
        Ok(vec![Action::StateChanged])
    }

    pub fn set_grid_offset(&mut self, x: f64, y: f64) -> Vec<Action> {
        if !x.is_finite() || !y.is_finite() {
            return Vec::new();
        }
        self.state.map.grid_offset_x = x;
        self.state.map.grid_offset_y = y;
        vec![Action::StateChanged]
    }

    pub fn set_grid_visible(&mut self, visible: bool) -> Vec<Action> {
        self.state.map.grid_visible = visible;
        vec![Action::StateChanged]
    }

    pub fn set_grid_color(&mut self, color: impl Into<String>) -> Vec<Action> {
        self.state.map.grid_color = color.into();
        vec![Action::StateChanged]
    }

    /// # Errors
    ///
    /// [`MapError::InvalidOpacity`] outside `0..=1`.
    pub fn set_grid_opacity(&mut self, opacity: f64) -> Result<Vec<Action>, MapError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MapError::InvalidOpacity(opacity));
        }
        self.state.map.grid_opacity = opacity;
        Ok(vec![Action::StateChanged])
    }

    // --- Display view ---

    /// Move what the display view shows.
    pub fn set_player_offset(&mut self, offset: Point) -> Vec<Action> {
        if !offset.x.is_finite() || !offset.y.is_finite() {
            return Vec::new();
        }
        self.state.player_view_offset = offset;
        vec![Action::StateChanged]
    }

    /// # Errors
    ///
    /// [`MapError::InvalidPixelsPerInch`] for non-finite or non-positive input.
    pub fn set_pixels_per_inch(&mut self, value: f64) -> Result<Vec<Action>, MapError> {
        self.state.calibration.set_pixels_per_inch(value)?;
        Ok(vec![Action::StateChanged])
    }

    pub fn save_calibration(&mut self) -> Vec<Action> {
        self.state.calibration.save();
        vec![Action::StateChanged]
    }

    pub fn restore_calibration(&mut self) -> Vec<Action> {
        self.state.calibration.restore();
        vec![Action::StateChanged]
    }

    /// Record the rectangle the display reported. Drawn as an overlay only.
    pub fn set_player_viewport(&mut self, rect: VisibleRect) -> Vec<Action> {
        if self.player_viewport == Some(rect) {
            return Vec::new();
        }
        self.player_viewport = Some(rect);
        vec![Action::RenderNeeded]
    }

    // --- Grid calibration ---

    /// # Errors
    ///
    /// [`MapError::CalibrationActive`] if already calibrating.
    pub fn start_calibration(&mut self) -> Result<Vec<Action>, MapError> {
        self.calibration.start()?;
        Ok(vec![Action::RenderNeeded])
    }

    /// Feed one "too big" / "too small" answer into the search.
    ///
    /// # Errors
    ///
    /// [`MapError::CalibrationInactive`] outside a search and
    /// [`MapError::GestureActive`] mid-gesture.
    pub fn calibration_feedback(&mut self, feedback: Feedback) -> Result<Vec<Action>, MapError> {
        if self.input.is_active() {
            return Err(MapError::GestureActive);
        }
        match self.calibration.feedback(feedback, &mut self.state)? {
            Step::Rejected => Ok(Vec::new()),
            Step::Accepted { .. } => {
                self.history.clear();
                Ok(vec![Action::StateChanged])
            }
        }
    }

    /// # Errors
    ///
    /// [`MapError::CalibrationInactive`] outside a search.
    pub fn confirm_calibration(&mut self) -> Result<Vec<Action>, MapError> {
        self.calibration.confirm()?;
        Ok(vec![Action::RenderNeeded])
    }

    /// # Errors
    ///
    /// [`MapError::CalibrationInactive`] outside a search.
    pub fn cancel_calibration(&mut self) -> Result<Vec<Action>, MapError> {
        self.calibration.cancel()?;
        Ok(vec![Action::RenderNeeded])
    }

    // --- Queries ---

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Cell currently under a screen point.
    #[must_use]
    pub fn cell_at(&self, screen_pt: Point) -> CellPos {
        self.state.map.pixel_to_cell(self.state.view.screen_to_map(screen_pt))
    }
}
