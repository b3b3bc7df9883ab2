//! Interactive grid-size calibration.
//!
//! The operator lays a physical ruler on the display and answers "too big"
//! or "too small" until one rendered cell matches one physical unit. Each
//! answer halves the remaining range of candidate cell sizes. There is no
//! automatic stop; the search ends on confirm or cancel.
//!
//! Every accepted step rebuilds the fog at the new cell size, so the fog
//! pattern does not survive calibration.

#[cfg(test)]
#[path = "calibration_test.rs"]
mod calibration_test;

use serde::{Deserialize, Serialize};

use crate::consts::{CALIBRATION_HIGH, CALIBRATION_LOW};
use crate::doc::{AppState, MapError};

/// Operator answer to the currently rendered cell size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// The rendered cell is larger than the ruler unit; shrink it.
    TooBig,
    /// The rendered cell is smaller than the ruler unit; grow it.
    TooSmall,
}

/// Search state. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GridCalibration {
    #[default]
    Inactive,
    Active { low: u32, high: u32 },
}

/// Result of one feedback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The grid moved to a new candidate size.
    Accepted { size: u32 },
    /// The step would cross the bounds; nothing changed.
    Rejected,
}

impl GridCalibration {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Current bounds, if a search is running.
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, u32)> {
        match *self {
            Self::Inactive => None,
            Self::Active { low, high } => Some((low, high)),
        }
    }

    /// Begin a search over `[CALIBRATION_LOW, CALIBRATION_HIGH]`. The grid
    /// size is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CalibrationActive`] if a search is already running.
    pub fn start(&mut self) -> Result<(), MapError> {
        if self.is_active() {
            return Err(MapError::CalibrationActive);
        }
        *self = Self::Active { low: CALIBRATION_LOW, high: CALIBRATION_HIGH };
        Ok(())
    }

    /// Narrow the range and move the grid to the midpoint of what is left.
    ///
    /// "Too big" bounds the search above by `current - 1`, "too small" bounds
    /// it below by `current + 1`. A bound never widens, even when the grid
    /// size was outside the range at start.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CalibrationInactive`] outside a search.
    pub fn feedback(&mut self, feedback: Feedback, state: &mut AppState) -> Result<Step, MapError> {
        let Self::Active { low, high } = *self else {
            return Err(MapError::CalibrationInactive);
        };
        let current = state.map.grid_size;
        let (next_low, next_high) = match feedback {
            Feedback::TooBig => (low, high.min(current.saturating_sub(1))),
            Feedback::TooSmall => (low.max(current.saturating_add(1)), high),
        };
        if current == 0 || next_low > next_high {
            return Ok(Step::Rejected);
        }
        let candidate = midpoint(next_low, next_high);
        // Rebuild even when the midpoint equals the current size.
        if !state.set_grid_size(candidate)? {
            state.fog = state.map.blank_fog()?;
        }
        *self = Self::Active { low: next_low, high: next_high };
        Ok(Step::Accepted { size: candidate })
    }

    /// End the search keeping the current cell size.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CalibrationInactive`] outside a search.
    pub fn confirm(&mut self) -> Result<(), MapError> {
        self.finish()
    }

    /// End the search. The cell size reached so far is kept; there is no
    /// rollback to the size in effect before `start`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::CalibrationInactive`] outside a search.
    pub fn cancel(&mut self) -> Result<(), MapError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), MapError> {
        if !self.is_active() {
            return Err(MapError::CalibrationInactive);
        }
        *self = Self::Inactive;
        Ok(())
    }
}

fn midpoint(low: u32, high: u32) -> u32 {
    low + (high - low) / 2
}
