#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ZOOM, MIN_ZOOM};

/// A point in either screen or map-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pan/zoom state of the controller view.
///
/// `x` / `y` are the screen position of the map origin in CSS pixels.
/// `scale` is a zoom factor (1.0 = one map pixel per screen pixel).
/// The display view ignores this entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale: 1.0 }
    }
}

impl ViewTransform {
    /// Convert a screen-space point to map-pixel coordinates.
    #[must_use]
    pub fn screen_to_map(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.x) / self.scale,
            y: (screen.y - self.y) / self.scale,
        }
    }

    /// Convert a map-pixel point to screen coordinates.
    #[must_use]
    pub fn map_to_screen(&self, map: Point) -> Point {
        Point {
            x: map.x * self.scale + self.x,
            y: map.y * self.scale + self.y,
        }
    }

    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Multiply the zoom by `factor`, keeping the map point under `anchor`
    /// fixed on screen. The result is clamped to the zoom limits.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let before = self.screen_to_map(anchor);
        self.scale = (self.scale * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.x = anchor.x - before.x * self.scale;
        self.y = anchor.y - before.y * self.scale;
    }
}
