//! The two state containers and the one-way projection between them.
//!
//! DESIGN
//! ======
//! The controller owns the authoritative `AppState` inside its
//! `EngineCore`. The display owns a [`DisplayWindow`] whose replica is only
//! ever replaced wholesale by a snapshot from the sync channel; nothing in
//! the display mutates it. [`project`] is the single function that decides
//! what the controller sends across.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use mapcore::camera::ViewTransform;
use mapcore::doc::AppState;
use mapcore::viewport::{VisibleRect, visible_rect};

/// The snapshot the display is allowed to see.
///
/// The controller's pan/zoom has no meaning on the display, which positions
/// itself from the player view offset and calibration, so it is reset.
#[must_use]
pub fn project(state: &AppState) -> AppState {
    AppState { view: ViewTransform::default(), ..state.clone() }
}

// =============================================================================
// DISPLAY WINDOW
// =============================================================================

/// The display view: a window size and, while open, a read-only replica.
#[derive(Debug)]
pub struct DisplayWindow {
    width: f64,
    height: f64,
    replica: Option<AppState>,
    /// Last rectangle handed back to the controller.
    reported: Option<VisibleRect>,
}

impl DisplayWindow {
    /// A closed window of the given size in display pixels.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, replica: None, reported: None }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.replica.is_some()
    }

    /// Open the window with an empty replica. Returns `false` if it was
    /// already open, in which case nothing changes.
    pub fn open(&mut self) -> bool {
        if self.is_open() {
            return false;
        }
        self.replica = Some(AppState::new());
        self.reported = None;
        true
    }

    /// Close the window and discard the replica. Returns `false` if it was
    /// already closed.
    pub fn close(&mut self) -> bool {
        self.reported = None;
        self.replica.take().is_some()
    }

    #[must_use]
    pub fn replica(&self) -> Option<&AppState> {
        self.replica.as_ref()
    }

    /// Replace the replica with `snapshot`. Ignored while closed.
    ///
    /// Returns the new visible rectangle when it differs from the last one
    /// reported, so the caller publishes only real changes.
    pub fn apply(&mut self, snapshot: AppState) -> Option<VisibleRect> {
        let replica = self.replica.as_mut()?;
        *replica = snapshot;
        let rect = visible_rect(replica, self.width, self.height)?;
        if self.reported == Some(rect) {
            return None;
        }
        self.reported = Some(rect);
        Some(rect)
    }
}
