//! Input model: tools, mouse buttons, and the gesture state machine.
//!
//! `Tool` captures what a primary-button drag does. `InputState` is the
//! gesture in flight between pointer-down and pointer-up, carrying what is
//! needed to turn the whole drag into a single history entry on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::fog::{CellPos, FogGrid};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Brush that removes fog.
    #[default]
    Reveal,
    /// Brush that adds fog.
    Hide,
    /// Drag a rectangle of cells; reveals by default, hides with Shift.
    Block,
    /// Freehand stroke.
    Draw,
    /// Transient pointer trail shown on the display.
    Laser,
    /// Drag to pan the controller view.
    Pan,
}

/// Keyboard modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button. Drives the active tool.
    Primary,
    /// Middle mouse button. Always pans.
    Middle,
    /// Right mouse button. Ignored.
    Secondary,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Vertical scroll amount in pixels (positive = down = zoom out).
    pub dy: f64,
}

/// The gesture in flight.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Brushing fog. `before` is the grid at pointer-down.
    PaintingFog {
        before: FogGrid,
        reveal: bool,
        /// Last cell painted, to skip repeat work while the pointer stays put.
        last_cell: CellPos,
    },
    /// Dragging a fog rectangle.
    DraggingBlock { anchor: CellPos, current: CellPos, reveal: bool },
    /// Collecting a freehand stroke in map pixels.
    Drawing { points: Vec<Point> },
    /// Laser trail is live; points accumulate in `AppState::laser`.
    Lasering,
    /// Panning the controller view.
    Panning {
        /// Screen position of the previous pointer event.
        last_screen: Point,
    },
}

impl InputState {
    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
