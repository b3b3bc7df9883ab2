//! Shared numeric constants for the map core.

// ── Grid ────────────────────────────────────────────────────────

/// Cell size used for new maps and as the clamp for a zero cell size.
pub const DEFAULT_GRID_SIZE: u32 = 50;

/// Largest accepted grid cell size, in map pixels.
pub const MAX_GRID_SIZE: u32 = 10_000;

/// Most cells a fog grid may hold. Larger maps need a larger cell size.
pub const MAX_FOG_CELLS: usize = 4_000_000;

/// Default grid line color.
pub const DEFAULT_GRID_COLOR: &str = "#000000";

/// Default grid line opacity in `[0, 1]`.
pub const DEFAULT_GRID_OPACITY: f64 = 0.3;

// ── History ─────────────────────────────────────────────────────

/// Maximum entries on each of the undo and redo stacks.
pub const HISTORY_CAPACITY: usize = 100;

// ── Calibration ─────────────────────────────────────────────────

/// Lower bound of the grid-size search when calibration starts.
pub const CALIBRATION_LOW: u32 = 10;

/// Upper bound of the grid-size search when calibration starts.
pub const CALIBRATION_HIGH: u32 = 500;

/// Display pixels per physical inch before the operator calibrates.
pub const DEFAULT_PIXELS_PER_INCH: f64 = 96.0;

// ── View ────────────────────────────────────────────────────────

/// Zoom limits for the controller view.
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

// ── Tools ───────────────────────────────────────────────────────

/// Default fog brush side length, in cells.
pub const DEFAULT_BRUSH_SIZE: u32 = 1;

/// Default drawing stroke color.
pub const DEFAULT_DRAW_COLOR: &str = "#ff0000";

/// Default drawing stroke width, in map pixels.
pub const DEFAULT_DRAW_WIDTH: f64 = 3.0;
