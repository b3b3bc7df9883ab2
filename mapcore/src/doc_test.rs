#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// validate_grid_size
// =============================================================

#[test]
fn validate_grid_size_accepts_whole_positive() {
    assert_eq!(validate_grid_size(1.0), Ok(1));
    assert_eq!(validate_grid_size(70.0), Ok(70));
    assert_eq!(validate_grid_size(f64::from(MAX_GRID_SIZE)), Ok(MAX_GRID_SIZE));
}

#[test]
fn validate_grid_size_rejects_bad_input() {
    for raw in [0.0, -5.0, 12.5, f64::NAN, f64::INFINITY, f64::from(MAX_GRID_SIZE) + 1.0] {
        assert!(matches!(validate_grid_size(raw), Err(MapError::InvalidGridSize(_))), "{raw} should be rejected");
    }
}

// =============================================================
// MapConfig
// =============================================================

#[test]
fn pixel_to_cell_floors() {
    let map = MapConfig { grid_size: 100, ..MapConfig::default() };
    assert_eq!(map.pixel_to_cell(Point::new(0.0, 0.0)), CellPos::new(0, 0));
    assert_eq!(map.pixel_to_cell(Point::new(99.9, 199.9)), CellPos::new(0, 1));
    assert_eq!(map.pixel_to_cell(Point::new(350.0, 250.0)), CellPos::new(3, 2));
}

#[test]
fn pixel_to_cell_honors_offset_and_goes_negative() {
    let map = MapConfig { grid_size: 50, grid_offset_x: 10.0, grid_offset_y: -20.0, ..MapConfig::default() };
    assert_eq!(map.pixel_to_cell(Point::new(10.0, -20.0)), CellPos::new(0, 0));
    assert_eq!(map.pixel_to_cell(Point::new(9.0, 29.0)), CellPos::new(-1, 0));
    assert_eq!(map.pixel_to_cell(Point::new(60.0, 30.0)), CellPos::new(1, 1));
}

#[test]
fn cell_origin_inverts_pixel_to_cell() {
    let map = MapConfig { grid_size: 40, grid_offset_x: 5.0, grid_offset_y: 7.0, ..MapConfig::default() };
    let cell = CellPos::new(3, 4);
    assert_eq!(map.pixel_to_cell(map.cell_origin(cell)), cell);
}

#[test]
fn fits_checks_derived_dimensions() {
    let map = MapConfig { image_width: 800, image_height: 600, grid_size: 100, ..MapConfig::default() };
    assert!(map.fits(&FogGrid::filled(6, 8, true)));
    assert!(!map.fits(&FogGrid::filled(8, 6, true)));
}

// =============================================================
// Calibration
// =============================================================

#[test]
fn calibration_save_and_restore() {
    let mut cal = Calibration::default();
    cal.set_pixels_per_inch(120.0).unwrap();
    cal.save();
    cal.set_pixels_per_inch(80.0).unwrap();
    assert_eq!(cal.pixels_per_inch, 80.0);
    cal.restore();
    assert_eq!(cal.pixels_per_inch, 120.0);
}

#[test]
fn calibration_rejects_non_positive() {
    let mut cal = Calibration::default();
    assert!(cal.set_pixels_per_inch(0.0).is_err());
    assert!(cal.set_pixels_per_inch(f64::NAN).is_err());
    assert_eq!(cal.pixels_per_inch, DEFAULT_PIXELS_PER_INCH);
}

// =============================================================
// AppState
// =============================================================

#[test]
fn new_state_has_no_image() {
    let state = AppState::new();
    assert!(!state.has_image());
    assert!(state.fog.is_empty());
    assert!(state.drawings.is_empty());
}

#[test]
fn for_image_builds_full_fog() {
    let state = AppState::for_image("maps/dungeon.png", 800, 600).expect("state");
    assert!(state.has_image());
    assert_eq!(state.map.grid_size, DEFAULT_GRID_SIZE);
    assert_eq!(state.fog.rows(), 12);
    assert_eq!(state.fog.cols(), 16);
    assert_eq!(state.fog.occluded_count(), 12 * 16);
}

#[test]
fn set_grid_size_rebuilds_fog() {
    let mut state = AppState::for_image("a.png", 800, 600).expect("state");
    state.fog.fill(false);
    assert_eq!(state.set_grid_size(100), Ok(true));
    assert_eq!(state.fog.rows(), 6);
    assert_eq!(state.fog.cols(), 8);
    assert_eq!(state.fog.occluded_count(), 48);
}

#[test]
fn set_grid_size_same_value_keeps_fog() {
    let mut state = AppState::for_image("a.png", 800, 600).expect("state");
    state.fog.fill(false);
    assert_eq!(state.set_grid_size(DEFAULT_GRID_SIZE), Ok(false));
    assert_eq!(state.fog.occluded_count(), 0);
}

#[test]
fn set_grid_size_zero_keeps_prior_value() {
    let mut state = AppState::for_image("a.png", 800, 600).expect("state");
    assert!(state.set_grid_size(0).is_err());
    assert_eq!(state.map.grid_size, DEFAULT_GRID_SIZE);
}

#[test]
fn for_image_refuses_image_too_large_to_fog() {
    let err = AppState::for_image("huge.png", u32::MAX, u32::MAX).expect_err("too large");
    assert!(matches!(err, MapError::Fog(FogShapeError::TooLarge { .. })));
}

#[test]
fn set_grid_size_too_fine_keeps_prior_state() {
    let mut state = AppState::for_image("big.png", 20_000, 20_000).expect("state");
    state.fog.fill(false);
    let before = state.clone();
    assert!(matches!(state.set_grid_size(1), Err(MapError::Fog(_))));
    assert_eq!(state, before);
}

#[test]
fn app_state_serde_round_trip() {
    let mut state = AppState::for_image("a.png", 300, 200).expect("state");
    state.drawings.push(Drawing::new(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)], "#00ff00", 2.0));
    state.laser.push(Point::new(5.0, 5.0));
    state.player_view_offset = Point::new(40.0, 60.0);
    let json = serde_json::to_string(&state).unwrap();
    assert!(json.contains("\"playerViewOffset\""));
    assert!(json.contains("\"gridSize\""));
    let back: AppState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}

#[test]
fn drawing_lookup_by_id() {
    let mut state = AppState::new();
    let d = Drawing::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)], "#fff", 1.0);
    let id = d.id;
    state.drawings.push(d);
    assert!(state.drawing(&id).is_some());
    assert!(state.drawing(&uuid::Uuid::new_v4()).is_none());
}
