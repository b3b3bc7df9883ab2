//! Visible-region math for the display view.
//!
//! The display renders one grid cell at one physical inch, so its scale is
//! `pixels_per_inch / grid_size` display pixels per map pixel. The region it
//! shows starts at the player view offset and spans the window divided by
//! that scale. The controller draws the reported rectangle as an overlay.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::doc::AppState;

/// Axis-aligned rectangle in map-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisibleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Display pixels per map pixel for a given calibration and cell size.
#[must_use]
pub fn display_scale(pixels_per_inch: f64, grid_size: u32) -> f64 {
    pixels_per_inch / f64::from(grid_size.max(1))
}

/// Map-space rectangle the display window covers.
///
/// Returns `None` when the scale is degenerate (non-positive or non-finite)
/// or the window has no area.
#[must_use]
pub fn visible_rect(state: &AppState, window_width: f64, window_height: f64) -> Option<VisibleRect> {
    let scale = display_scale(state.calibration.pixels_per_inch, state.map.grid_size);
    if !scale.is_finite() || scale <= 0.0 || window_width <= 0.0 || window_height <= 0.0 {
        return None;
    }
    Some(VisibleRect {
        x: state.player_view_offset.x,
        y: state.player_view_offset.y,
        width: window_width / scale,
        height: window_height / scale,
    })
}
