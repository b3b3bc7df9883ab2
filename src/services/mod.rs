//! Shell services around the map core.
//!
//! ARCHITECTURE
//! ============
//! `mapcore` owns every rule about the session. These modules move its
//! snapshots between views (`sync`, `bridge`), keep them on disk
//! (`persistence`), and run the two event loops (`controller`, `display`).

pub mod bridge;
pub mod controller;
pub mod display;
pub mod persistence;
pub mod sync;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch; 0 if the clock is before it.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
