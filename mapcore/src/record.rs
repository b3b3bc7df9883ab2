//! Persisted per-map record and the merge applied when a map is reopened.
//!
//! One `SavedMapState` exists per source image. The JSON shape is:
//!
//! ```text
//! { filePath, imageWidth, imageHeight, gridSize, gridVisible, gridColor,
//!   gridOpacity, gridOffsetX, gridOffsetY, fog: { cells, rows, cols },
//!   drawings: [...], view, playerViewOffset,
//!   calibration: { pixelsPerInch, savedPixelsPerInch }, savedAt }
//! ```
//!
//! Older records may lack the grid offsets or `savedPixelsPerInch`; those
//! default to zero and to the current `pixelsPerInch` respectively.

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;

use serde::{Deserialize, Serialize};

use crate::camera::{Point, ViewTransform};
use crate::consts::{
    DEFAULT_GRID_COLOR, DEFAULT_GRID_OPACITY, DEFAULT_GRID_SIZE, DEFAULT_PIXELS_PER_INCH, MAX_GRID_SIZE, MAX_ZOOM, MIN_ZOOM,
};
use crate::doc::{AppState, Calibration, Drawing, MapConfig, MapError};
use crate::fog::FogGrid;

/// Dimensions reported by the image decoder for a freshly opened map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub file_path: String,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    #[must_use]
    pub fn new(file_path: impl Into<String>, width: u32, height: u32) -> Self {
        Self { file_path: file_path.into(), width, height }
    }
}

/// Calibration as stored on disk; the restore point may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCalibration {
    pub pixels_per_inch: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_pixels_per_inch: Option<f64>,
}

impl Default for SavedCalibration {
    fn default() -> Self {
        Self { pixels_per_inch: DEFAULT_PIXELS_PER_INCH, saved_pixels_per_inch: None }
    }
}

/// Snapshot of everything durable about one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMapState {
    pub file_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub grid_size: u32,
    #[serde(default = "default_grid_visible")]
    pub grid_visible: bool,
    #[serde(default = "default_grid_color")]
    pub grid_color: String,
    #[serde(default = "default_grid_opacity")]
    pub grid_opacity: f64,
    #[serde(default)]
    pub grid_offset_x: f64,
    #[serde(default)]
    pub grid_offset_y: f64,
    pub fog: FogGrid,
    #[serde(default)]
    pub drawings: Vec<Drawing>,
    #[serde(default)]
    pub view: ViewTransform,
    #[serde(default)]
    pub player_view_offset: Point,
    #[serde(default)]
    pub calibration: SavedCalibration,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub saved_at: i64,
}

fn default_grid_visible() -> bool {
    true
}

fn default_grid_color() -> String {
    DEFAULT_GRID_COLOR.to_owned()
}

fn default_grid_opacity() -> f64 {
    DEFAULT_GRID_OPACITY
}

impl SavedMapState {
    /// Snapshot `state`. Returns `None` when no image is loaded.
    #[must_use]
    pub fn capture(state: &AppState, saved_at: i64) -> Option<Self> {
        let file_path = state.map.file_path.clone()?;
        Some(Self {
            file_path,
            image_width: state.map.image_width,
            image_height: state.map.image_height,
            grid_size: state.map.grid_size,
            grid_visible: state.map.grid_visible,
            grid_color: state.map.grid_color.clone(),
            grid_opacity: state.map.grid_opacity,
            grid_offset_x: state.map.grid_offset_x,
            grid_offset_y: state.map.grid_offset_y,
            fog: state.fog.clone(),
            drawings: state.drawings.clone(),
            view: state.view,
            player_view_offset: state.player_view_offset,
            calibration: SavedCalibration {
                pixels_per_inch: state.calibration.pixels_per_inch,
                saved_pixels_per_inch: Some(state.calibration.saved_pixels_per_inch),
            },
            saved_at,
        })
    }

    /// Whether two records hold the same content, ignoring `saved_at`.
    #[must_use]
    pub fn same_content(&self, other: &SavedMapState) -> bool {
        Self { saved_at: 0, ..self.clone() } == Self { saved_at: 0, ..other.clone() }
    }

    /// Build the session for a reopened map.
    ///
    /// Saved grid, drawings, view, offset, and calibration are taken as-is.
    /// Pixel dimensions always come from the decoded image. If the saved fog
    /// no longer matches those dimensions it is resized, keeping the
    /// overlapping cells. A saved view that is not finite or out of the
    /// zoom range is replaced by the default view.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Fog`] when the decoded image needs more fog cells
    /// than allowed at the saved cell size.
    pub fn merge(self, image: &DecodedImage) -> Result<AppState, MapError> {
        let grid_size =
            if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE { DEFAULT_GRID_SIZE } else { self.grid_size };
        let map = MapConfig {
            file_path: Some(image.file_path.clone()),
            image_width: image.width,
            image_height: image.height,
            grid_size,
            grid_visible: self.grid_visible,
            grid_color: self.grid_color,
            grid_opacity: self.grid_opacity,
            grid_offset_x: self.grid_offset_x,
            grid_offset_y: self.grid_offset_y,
        };
        let fog = if map.fits(&self.fog) {
            self.fog
        } else {
            let blank = map.blank_fog()?;
            self.fog.resized(blank.rows(), blank.cols())
        };
        let calibration = Calibration {
            pixels_per_inch: self.calibration.pixels_per_inch,
            saved_pixels_per_inch: self.calibration.saved_pixels_per_inch.unwrap_or(self.calibration.pixels_per_inch),
        };
        let view = if usable_view(&self.view) { self.view } else { ViewTransform::default() };
        Ok(AppState {
            map,
            fog,
            drawings: self.drawings,
            laser: Vec::new(),
            view,
            player_view_offset: self.player_view_offset,
            calibration,
        })
    }
}

fn usable_view(view: &ViewTransform) -> bool {
    view.x.is_finite() && view.y.is_finite() && (MIN_ZOOM..=MAX_ZOOM).contains(&view.scale)
}

/// Session for a map load: the merged record when one exists, otherwise a
/// fresh fully fogged state.
///
/// # Errors
///
/// Returns [`MapError::Fog`] when the image is too large to fog.
pub fn session_for(image: &DecodedImage, saved: Option<SavedMapState>) -> Result<AppState, MapError> {
    match saved {
        Some(record) => record.merge(image),
        None => AppState::for_image(image.file_path.clone(), image.width, image.height),
    }
}
