//! Battle-map core: fog of war, reversible edits, grid calibration, and the
//! persisted map record.
//!
//! This crate is pure and synchronous. It owns the session model and every
//! rule about how it may change; the application shell wires it to input,
//! the sync channel, and the filesystem. Rendering consumes `AppState`
//! read-only and is not part of this crate.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Controller engine: the single entry point for mutations |
//! | [`doc`] | `AppState`, `MapConfig`, drawings, display calibration |
//! | [`fog`] | Fog-of-war grid, brush/rect mutation, cell diffs |
//! | [`history`] | Invertible operations and bounded undo/redo |
//! | [`calibration`] | Binary search over grid cell sizes |
//! | [`camera`] | Points and the controller pan/zoom transform |
//! | [`viewport`] | Display visible-rectangle math |
//! | [`record`] | Saved map record and merge-on-load |
//! | [`input`] | Tools, buttons, and the gesture state machine |
//! | [`consts`] | Shared constants (defaults, limits, capacities) |

pub mod calibration;
pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod fog;
pub mod history;
pub mod input;
pub mod record;
pub mod viewport;
