use super::*;
use crate::fog::CellPos;

fn state_with_grid(size: u32) -> AppState {
    let mut state = AppState::for_image("table.png", 2000, 1500).expect("state");
    state.set_grid_size(size).unwrap();
    state
}

fn gap(cal: &GridCalibration) -> u32 {
    let (low, high) = cal.bounds().unwrap();
    high - low
}

// =============================================================
// Lifecycle
// =============================================================

#[test]
fn start_sets_initial_bounds_without_touching_grid() {
    let state = state_with_grid(70);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    assert_eq!(cal.bounds(), Some((CALIBRATION_LOW, CALIBRATION_HIGH)));
    assert_eq!(state.map.grid_size, 70);
}

#[test]
fn start_twice_is_an_error() {
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    assert_eq!(cal.start(), Err(MapError::CalibrationActive));
}

#[test]
fn feedback_while_inactive_is_an_error() {
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::Inactive;
    assert_eq!(cal.feedback(Feedback::TooBig, &mut state), Err(MapError::CalibrationInactive));
    assert_eq!(state.map.grid_size, 50);
}

#[test]
fn confirm_and_cancel_keep_current_size() {
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    cal.feedback(Feedback::TooBig, &mut state).unwrap();
    let reached = state.map.grid_size;
    cal.confirm().unwrap();
    assert!(!cal.is_active());
    assert_eq!(state.map.grid_size, reached);

    cal.start().unwrap();
    cal.feedback(Feedback::TooSmall, &mut state).unwrap();
    let reached = state.map.grid_size;
    cal.cancel().unwrap();
    assert!(!cal.is_active());
    assert_eq!(state.map.grid_size, reached);
}

#[test]
fn confirm_while_inactive_is_an_error() {
    let mut cal = GridCalibration::Inactive;
    assert_eq!(cal.confirm(), Err(MapError::CalibrationInactive));
    assert_eq!(cal.cancel(), Err(MapError::CalibrationInactive));
}

// =============================================================
// Search steps
// =============================================================

#[test]
fn too_big_moves_to_lower_midpoint() {
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    let step = cal.feedback(Feedback::TooBig, &mut state).unwrap();
    // (10 + 49) / 2
    assert_eq!(step, Step::Accepted { size: 29 });
    assert_eq!(state.map.grid_size, 29);
    assert_eq!(cal.bounds(), Some((10, 49)));
}

#[test]
fn too_small_moves_to_upper_midpoint() {
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    let step = cal.feedback(Feedback::TooSmall, &mut state).unwrap();
    // (51 + 500) / 2
    assert_eq!(step, Step::Accepted { size: 275 });
    assert_eq!(cal.bounds(), Some((51, 500)));
}

#[test]
fn accepted_step_rebuilds_fog() {
    let mut state = state_with_grid(50);
    state.fog.modify(CellPos::new(1, 1), 5, true);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    cal.feedback(Feedback::TooSmall, &mut state).unwrap();
    assert!(state.map.fits(&state.fog));
    assert_eq!(state.fog.occluded_count(), state.fog.rows() * state.fog.cols());
}

#[test]
fn alternating_feedback_shrinks_gap_monotonically() {
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    let mut last_gap = gap(&cal);
    let mut answers = [Feedback::TooBig, Feedback::TooSmall].into_iter().cycle();
    for _ in 0..20 {
        let before = cal;
        let step = cal.feedback(answers.next().unwrap(), &mut state).unwrap();
        match step {
            Step::Accepted { size } => {
                let g = gap(&cal);
                assert!(g < last_gap, "gap {g} did not shrink from {last_gap}");
                last_gap = g;
                let (low, high) = cal.bounds().unwrap();
                assert!(low <= size && size <= high);
            }
            Step::Rejected => assert_eq!(cal, before),
        }
    }
}

#[test]
fn step_that_would_invert_bounds_is_rejected() {
    let mut state = state_with_grid(10);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    // current - 1 = 9 < low = 10
    let step = cal.feedback(Feedback::TooBig, &mut state).unwrap();
    assert_eq!(step, Step::Rejected);
    assert_eq!(cal.bounds(), Some((10, 500)));
    assert_eq!(state.map.grid_size, 10);
}

#[test]
fn converges_on_target_size() {
    let target = 137;
    let mut state = state_with_grid(50);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    for _ in 0..20 {
        let current = state.map.grid_size;
        if current == target {
            break;
        }
        let answer = if current > target { Feedback::TooBig } else { Feedback::TooSmall };
        cal.feedback(answer, &mut state).unwrap();
    }
    assert_eq!(state.map.grid_size, target);
}

#[test]
fn size_outside_bounds_never_widens_range() {
    let mut state = state_with_grid(800);
    let mut cal = GridCalibration::default();
    cal.start().unwrap();
    assert_eq!(cal.feedback(Feedback::TooSmall, &mut state).unwrap(), Step::Rejected);
    let step = cal.feedback(Feedback::TooBig, &mut state).unwrap();
    assert_eq!(step, Step::Accepted { size: 255 });
    assert_eq!(cal.bounds(), Some((10, 500)));
}
