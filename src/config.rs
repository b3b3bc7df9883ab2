//! Shell configuration parsed from environment variables.
//!
//! Every knob has a default, so an empty environment gives a working
//! single-process session. `.env` files are honoured via `dotenvy` in `main`.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mapcore::consts::HISTORY_CAPACITY;

pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_SYNC_ADDR: &str = "127.0.0.1:47410";
pub const DEFAULT_DISPLAY_WIDTH: f64 = 1920.0;
pub const DEFAULT_DISPLAY_HEIGHT: f64 = 1080.0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown BATTLEMAP_ROLE: {0} (expected local, controller, or display)")]
    UnknownRole(String),
}

/// Which views this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Controller and display in one process, joined by an in-memory bus.
    #[default]
    Local,
    /// Controller only; serves the display over TCP.
    Controller,
    /// Display only; connects to a controller over TCP.
    Display,
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "controller" => Ok(Self::Controller),
            "display" | "player" => Ok(Self::Display),
            _ => Err(ConfigError::UnknownRole(raw.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding one JSON record per map.
    pub store_dir: PathBuf,
    /// Quiet period after the last change before an autosave is written.
    pub save_debounce: Duration,
    pub role: Role,
    /// Loopback address of the controller's sync bridge.
    pub sync_addr: String,
    /// Display window size in display pixels.
    pub display_width: f64,
    pub display_height: f64,
    /// Undo/redo entries kept per stack.
    pub history_capacity: usize,
}

impl Config {
    /// Build config from `BATTLEMAP_*` environment variables.
    ///
    /// Optional:
    /// - `BATTLEMAP_STORE_DIR`: default `$HOME/.battlemap/maps`
    /// - `BATTLEMAP_SAVE_DEBOUNCE_MS`: default 1000
    /// - `BATTLEMAP_ROLE`: `local` (default), `controller`, or `display`
    /// - `BATTLEMAP_SYNC_ADDR`: default `127.0.0.1:47410`
    /// - `BATTLEMAP_DISPLAY_WIDTH` / `BATTLEMAP_DISPLAY_HEIGHT`: default 1920x1080
    /// - `BATTLEMAP_HISTORY_CAPACITY`: default 100
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownRole`] when `BATTLEMAP_ROLE` is set to something else.
    pub fn from_env() -> Result<Self, ConfigError> {
        let role = match std::env::var("BATTLEMAP_ROLE") {
            Ok(raw) => raw.parse()?,
            Err(_) => Role::default(),
        };
        let store_dir = std::env::var("BATTLEMAP_STORE_DIR").map_or_else(|_| default_store_dir(), PathBuf::from);

        Ok(Self {
            store_dir,
            save_debounce: Duration::from_millis(env_parse("BATTLEMAP_SAVE_DEBOUNCE_MS", DEFAULT_SAVE_DEBOUNCE_MS)),
            role,
            sync_addr: std::env::var("BATTLEMAP_SYNC_ADDR").unwrap_or_else(|_| DEFAULT_SYNC_ADDR.to_owned()),
            display_width: positive_or(env_parse("BATTLEMAP_DISPLAY_WIDTH", DEFAULT_DISPLAY_WIDTH), DEFAULT_DISPLAY_WIDTH),
            display_height: positive_or(
                env_parse("BATTLEMAP_DISPLAY_HEIGHT", DEFAULT_DISPLAY_HEIGHT),
                DEFAULT_DISPLAY_HEIGHT,
            ),
            history_capacity: env_parse("BATTLEMAP_HISTORY_CAPACITY", HISTORY_CAPACITY).max(1),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { default }
}

fn default_store_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".battlemap")
        .join("maps")
}
