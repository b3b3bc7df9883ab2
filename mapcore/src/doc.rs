//! Session model: map configuration, drawings, and the `AppState` aggregate.
//!
//! `AppState` is everything the display view needs to paint the battle map.
//! The controller owns the authoritative copy and mutates it through the
//! engine; the display holds a replica replaced wholesale from broadcasts.
//! All types here serialize with camelCase keys, matching the persisted
//! record format.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::{Point, ViewTransform};
use crate::consts::{
    DEFAULT_GRID_COLOR, DEFAULT_GRID_OPACITY, DEFAULT_GRID_SIZE, DEFAULT_PIXELS_PER_INCH, MAX_GRID_SIZE,
};
use crate::fog::{CellPos, FogGrid, FogShapeError};

/// Unique identifier for a drawing.
pub type DrawingId = Uuid;

/// Rejected configuration input. State is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("invalid grid size {0}: must be a positive whole number of pixels")]
    InvalidGridSize(f64),
    #[error("invalid pixels-per-inch {0}: must be finite and positive")]
    InvalidPixelsPerInch(f64),
    #[error("invalid grid opacity {0}: must be within 0..=1")]
    InvalidOpacity(f64),
    #[error("calibration is not active")]
    CalibrationInactive,
    #[error("calibration is already active")]
    CalibrationActive,
    #[error("a gesture is in progress")]
    GestureActive,
    #[error("fog grid rejected: {0}")]
    Fog(#[from] FogShapeError),
}

/// Validate a raw grid size coming from the UI layer.
///
/// # Errors
///
/// Returns [`MapError::InvalidGridSize`] for non-finite, fractional, zero,
/// negative, or oversized values.
pub fn validate_grid_size(raw: f64) -> Result<u32, MapError> {
    if !raw.is_finite() || raw.fract() != 0.0 || raw < 1.0 || raw > f64::from(MAX_GRID_SIZE) {
        return Err(MapError::InvalidGridSize(raw));
    }
    Ok(raw as u32)
}

/// Map image identity, dimensions, and grid overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// Source image path. `None` until a map is loaded.
    pub file_path: Option<String>,
    /// Decoded image width in pixels.
    pub image_width: u32,
    /// Decoded image height in pixels.
    pub image_height: u32,
    /// Grid cell side in map pixels. Always > 0.
    pub grid_size: u32,
    pub grid_visible: bool,
    pub grid_color: String,
    pub grid_opacity: f64,
    /// Pixel shift aligning the grid with the map art.
    pub grid_offset_x: f64,
    pub grid_offset_y: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            image_width: 0,
            image_height: 0,
            grid_size: DEFAULT_GRID_SIZE,
            grid_visible: true,
            grid_color: DEFAULT_GRID_COLOR.to_owned(),
            grid_opacity: DEFAULT_GRID_OPACITY,
            grid_offset_x: 0.0,
            grid_offset_y: 0.0,
        }
    }
}

impl MapConfig {
    /// Map a map-pixel position to the cell containing it.
    ///
    /// This is the single pixel→cell mapping; renderers and mutation share it.
    #[must_use]
    pub fn pixel_to_cell(&self, p: Point) -> CellPos {
        let size = f64::from(self.grid_size.max(1));
        CellPos {
            col: ((p.x - self.grid_offset_x) / size).floor() as i64,
            row: ((p.y - self.grid_offset_y) / size).floor() as i64,
        }
    }

    /// Map-pixel position of a cell's top-left corner.
    #[must_use]
    pub fn cell_origin(&self, cell: CellPos) -> Point {
        let size = f64::from(self.grid_size);
        Point {
            x: cell.col as f64 * size + self.grid_offset_x,
            y: cell.row as f64 * size + self.grid_offset_y,
        }
    }

    /// A fresh fully occluded fog grid sized for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Fog`] when the image needs more cells than a fog
    /// grid may hold at this cell size.
    pub fn blank_fog(&self) -> Result<FogGrid, MapError> {
        Ok(FogGrid::initialize(self.image_width, self.image_height, self.grid_size)?)
    }

    /// Whether `fog` has the dimensions this configuration implies.
    #[must_use]
    pub fn fits(&self, fog: &FogGrid) -> bool {
        let size = self.grid_size.max(1);
        fog.rows() == self.image_height.div_ceil(size) as usize && fog.cols() == self.image_width.div_ceil(size) as usize
    }
}

/// A freehand stroke in map-pixel space. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: DrawingId,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
}

impl Drawing {
    #[must_use]
    pub fn new(points: Vec<Point>, color: impl Into<String>, width: f64) -> Self {
        Self { id: Uuid::new_v4(), points, color: color.into(), width }
    }
}

/// Physical scale of the display view plus a restore point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    /// Display pixels per physical inch; one grid cell renders one inch wide.
    pub pixels_per_inch: f64,
    /// Last explicitly saved value.
    pub saved_pixels_per_inch: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { pixels_per_inch: DEFAULT_PIXELS_PER_INCH, saved_pixels_per_inch: DEFAULT_PIXELS_PER_INCH }
    }
}

impl Calibration {
    /// # Errors
    ///
    /// Returns [`MapError::InvalidPixelsPerInch`] for non-finite or non-positive input.
    pub fn set_pixels_per_inch(&mut self, value: f64) -> Result<(), MapError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(MapError::InvalidPixelsPerInch(value));
        }
        self.pixels_per_inch = value;
        Ok(())
    }

    /// Remember the current value as the restore point.
    pub fn save(&mut self) {
        self.saved_pixels_per_inch = self.pixels_per_inch;
    }

    /// Return to the restore point.
    pub fn restore(&mut self) {
        self.pixels_per_inch = self.saved_pixels_per_inch;
    }
}

/// The aggregate root shared (by value) between the two views.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub map: MapConfig,
    pub fog: FogGrid,
    pub drawings: Vec<Drawing>,
    /// Transient pointer trail. Never persisted.
    pub laser: Vec<Point>,
    /// Controller pan/zoom.
    pub view: ViewTransform,
    /// Map-space origin of what the display view shows.
    pub player_view_offset: Point,
    pub calibration: Calibration,
}

impl AppState {
    /// Empty session with no map loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh session for a newly decoded image, fully fogged.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Fog`] when the image is too large for the default
    /// cell size.
    pub fn for_image(file_path: impl Into<String>, width: u32, height: u32) -> Result<Self, MapError> {
        let map = MapConfig { file_path: Some(file_path.into()), image_width: width, image_height: height, ..MapConfig::default() };
        let fog = map.blank_fog()?;
        Ok(Self { map, fog, ..Self::default() })
    }

    /// Whether a map image is loaded.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.map.file_path.is_some()
    }

    /// Change the cell size and rebuild the fog from scratch.
    ///
    /// The previous coverage pattern is lost. Setting the current size again
    /// is a no-op and keeps the fog.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidGridSize`] for zero or oversized values and
    /// [`MapError::Fog`] when the map would need too many cells. The prior
    /// size and fog are kept.
    pub fn set_grid_size(&mut self, size: u32) -> Result<bool, MapError> {
        if size == 0 || size > MAX_GRID_SIZE {
            return Err(MapError::InvalidGridSize(f64::from(size)));
        }
        if size == self.map.grid_size {
            return Ok(false);
        }
        let map = MapConfig { grid_size: size, ..self.map.clone() };
        self.fog = map.blank_fog()?;
        self.map = map;
        Ok(true)
    }

    /// Drawing by id.
    #[must_use]
    pub fn drawing(&self, id: &DrawingId) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == *id)
    }
}
