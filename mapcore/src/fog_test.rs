use super::*;

fn cell(col: i64, row: i64) -> CellPos {
    CellPos::new(col, row)
}

fn revealed_cells(grid: &FogGrid) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if grid.is_occluded(row, col) == Some(false) {
                out.push((row, col));
            }
        }
    }
    out
}

// =============================================================
// initialize
// =============================================================

#[test]
fn initialize_uses_ceiling_division() {
    let grid = FogGrid::initialize(800, 600, 100).expect("grid");
    assert_eq!(grid.cols(), 8);
    assert_eq!(grid.rows(), 6);

    let grid = FogGrid::initialize(801, 599, 100).expect("grid");
    assert_eq!(grid.cols(), 9);
    assert_eq!(grid.rows(), 6);
}

#[test]
fn initialize_is_fully_occluded() {
    let grid = FogGrid::initialize(333, 127, 25).expect("grid");
    assert_eq!(grid.occluded_count(), grid.rows() * grid.cols());
    assert!(revealed_cells(&grid).is_empty());
}

#[test]
fn initialize_dimension_sweep() {
    for (w, h, size) in [(1, 1, 1), (10, 10, 3), (1000, 1, 7), (99, 250, 50), (64, 64, 64)] {
        let grid = FogGrid::initialize(w, h, size).expect("grid");
        assert_eq!(grid.rows(), h.div_ceil(size) as usize, "rows for {w}x{h}@{size}");
        assert_eq!(grid.cols(), w.div_ceil(size) as usize, "cols for {w}x{h}@{size}");
        assert_eq!(grid.occluded_count(), grid.rows() * grid.cols());
    }
}

#[test]
fn initialize_zero_cell_size_clamps_to_default() {
    let grid = FogGrid::initialize(500, 250, 0).expect("grid");
    assert_eq!(grid.cols(), 500usize.div_ceil(DEFAULT_GRID_SIZE as usize));
    assert_eq!(grid.rows(), 250usize.div_ceil(DEFAULT_GRID_SIZE as usize));
}

#[test]
fn initialize_empty_image_has_no_cells() {
    let grid = FogGrid::initialize(0, 0, 50).expect("grid");
    assert!(grid.is_empty());
    assert_eq!(grid.rows(), 0);
}

#[test]
fn initialize_refuses_oversized_grid() {
    let err = FogGrid::initialize(u32::MAX, u32::MAX, 1).expect_err("too large");
    assert!(matches!(err, FogShapeError::TooLarge { .. }));
    // Exactly at the limit is fine.
    let grid = FogGrid::initialize(2000, 2000, 1).expect("at limit");
    assert_eq!(grid.rows() * grid.cols(), MAX_FOG_CELLS);
}

// =============================================================
// modify
// =============================================================

#[test]
fn modify_single_cell_reveals_exactly_that_cell() {
    let mut grid = FogGrid::initialize(800, 600, 100).expect("grid");
    let written = grid.modify(cell(3, 2), 1, true);
    assert_eq!(written, 1);
    assert_eq!(revealed_cells(&grid), vec![(2, 3)]);
}

#[test]
fn modify_hide_restores_occlusion() {
    let mut grid = FogGrid::filled(4, 4, false);
    grid.modify(cell(1, 1), 1, false);
    assert_eq!(grid.is_occluded(1, 1), Some(true));
    assert_eq!(grid.occluded_count(), 1);
}

#[test]
fn modify_odd_brush_is_centered() {
    let mut grid = FogGrid::filled(10, 10, true);
    grid.modify(cell(5, 5), 3, true);
    let revealed = revealed_cells(&grid);
    assert_eq!(revealed.len(), 9);
    assert!(revealed.contains(&(4, 4)));
    assert!(revealed.contains(&(6, 6)));
    assert!(!revealed.contains(&(7, 7)));
}

#[test]
fn modify_even_brush_biases_toward_lower_indices() {
    let mut grid = FogGrid::filled(10, 10, true);
    // size 2, offset 1: range [center-1, center]
    grid.modify(cell(5, 5), 2, true);
    assert_eq!(revealed_cells(&grid), vec![(4, 4), (4, 5), (5, 4), (5, 5)]);

    let mut grid = FogGrid::filled(10, 10, true);
    // size 4, offset 2: range [center-2, center+1]
    grid.modify(cell(5, 5), 4, true);
    let revealed = revealed_cells(&grid);
    assert_eq!(revealed.len(), 16);
    assert!(revealed.contains(&(3, 3)));
    assert!(revealed.contains(&(6, 6)));
    assert!(!revealed.contains(&(7, 7)));
    assert!(!revealed.contains(&(2, 2)));
}

#[test]
fn modify_clips_at_edges() {
    let mut grid = FogGrid::filled(3, 3, true);
    let written = grid.modify(cell(0, 0), 3, true);
    assert_eq!(written, 4);
    assert_eq!(revealed_cells(&grid), vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
}

#[test]
fn modify_fully_outside_is_silent_noop() {
    let mut grid = FogGrid::filled(3, 3, true);
    assert_eq!(grid.modify(cell(-10, -10), 3, true), 0);
    assert_eq!(grid.modify(cell(50, 1), 1, true), 0);
    assert_eq!(grid.occluded_count(), 9);
}

#[test]
fn modify_zero_brush_acts_as_one() {
    let mut grid = FogGrid::filled(3, 3, true);
    assert_eq!(grid.modify(cell(1, 1), 0, true), 1);
}

// =============================================================
// rects
// =============================================================

#[test]
fn rect_spanning_normalizes_corners() {
    let rect = CellRect::spanning(cell(5, 1), cell(2, 4));
    assert_eq!(rect, CellRect { top: 1, left: 2, bottom: 4, right: 5 });
}

#[test]
fn rect_clip_outside_is_none() {
    let rect = CellRect::spanning(cell(-5, -5), cell(-1, -1));
    assert!(rect.clip(4, 4).is_none());
}

#[test]
fn capture_and_restore_rect_round_trip() {
    let mut grid = FogGrid::filled(4, 4, true);
    grid.set(1, 1, false);
    grid.set(2, 3, false);
    let rect = CellRect::spanning(cell(1, 1), cell(5, 2));
    let captured = grid.capture_rect(rect);
    assert_eq!(captured.len(), 2 * 3);

    let before = grid.clone();
    grid.fill_rect(rect, false);
    assert_ne!(grid, before);
    grid.restore_rect(rect, &captured);
    assert_eq!(grid, before);
}

// =============================================================
// diff
// =============================================================

#[test]
fn diff_lists_only_changed_cells() {
    let before = FogGrid::filled(3, 3, true);
    let mut after = before.clone();
    after.set(0, 2, false);
    after.set(2, 1, false);
    let changes = FogGrid::diff(&before, &after);
    assert_eq!(
        changes,
        vec![
            CellChange { row: 0, col: 2, was_revealed: true },
            CellChange { row: 2, col: 1, was_revealed: true },
        ]
    );
}

#[test]
fn diff_of_hide_marks_not_revealed() {
    let before = FogGrid::filled(2, 2, false);
    let mut after = before.clone();
    after.set(1, 1, true);
    assert_eq!(FogGrid::diff(&before, &after), vec![CellChange { row: 1, col: 1, was_revealed: false }]);
}

#[test]
fn diff_identical_grids_is_empty() {
    let grid = FogGrid::initialize(300, 300, 30).expect("grid");
    assert!(FogGrid::diff(&grid, &grid.clone()).is_empty());
}

#[test]
fn diff_mismatched_shapes_clips_to_shared_region() {
    let before = FogGrid::filled(2, 2, true);
    let after = FogGrid::filled(3, 4, false);
    let changes = FogGrid::diff(&before, &after);
    assert_eq!(changes.len(), 4);
    assert!(changes.iter().all(|c| c.row < 2 && c.col < 2));
}

#[test]
fn apply_changes_backward_then_forward() {
    let before = FogGrid::initialize(500, 500, 100).expect("grid");
    let mut after = before.clone();
    after.modify(cell(2, 2), 3, true);
    let changes = FogGrid::diff(&before, &after);

    let mut grid = after.clone();
    grid.apply_changes(&changes, false);
    assert_eq!(grid, before);
    grid.apply_changes(&changes, true);
    assert_eq!(grid, after);
}

// =============================================================
// resize + serde
// =============================================================

#[test]
fn resized_keeps_overlap_and_fogs_new_cells() {
    let mut grid = FogGrid::filled(2, 2, false);
    grid.set(0, 1, true);
    let bigger = grid.resized(3, 3);
    assert_eq!(bigger.is_occluded(0, 0), Some(false));
    assert_eq!(bigger.is_occluded(0, 1), Some(true));
    assert_eq!(bigger.is_occluded(1, 1), Some(false));
    assert_eq!(bigger.is_occluded(2, 2), Some(true));

    let smaller = grid.resized(1, 1);
    assert_eq!(smaller.rows(), 1);
    assert_eq!(smaller.is_occluded(0, 0), Some(false));
}

#[test]
fn serializes_as_nested_rows() {
    let mut grid = FogGrid::filled(2, 3, true);
    grid.set(1, 2, false);
    let value = serde_json::to_value(&grid).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "cells": [[true, true, true], [true, true, false]],
            "rows": 2,
            "cols": 3
        })
    );
    let back: FogGrid = serde_json::from_value(value).unwrap();
    assert_eq!(back, grid);
}

#[test]
fn deserialize_rejects_ragged_rows() {
    let value = serde_json::json!({ "cells": [[true, true], [true]], "rows": 2, "cols": 2 });
    assert!(serde_json::from_value::<FogGrid>(value).is_err());
}

#[test]
fn deserialize_rejects_wrong_row_count() {
    let value = serde_json::json!({ "cells": [[true, true]], "rows": 2, "cols": 2 });
    assert!(serde_json::from_value::<FogGrid>(value).is_err());
}

#[test]
fn deserialize_rejects_overflowing_dimensions() {
    let value = serde_json::json!({ "cells": [[], []], "rows": 2, "cols": u64::MAX });
    assert!(serde_json::from_value::<FogGrid>(value).is_err());
    let value = serde_json::json!({ "cells": [[]], "rows": 1, "cols": MAX_FOG_CELLS + 1 });
    assert!(serde_json::from_value::<FogGrid>(value).is_err());
}

#[test]
fn row_slice_matches_cells() {
    let mut grid = FogGrid::filled(2, 3, true);
    grid.set(1, 0, false);
    assert_eq!(grid.row(1), Some(&[false, true, true][..]));
    assert_eq!(grid.row(2), None);
}
