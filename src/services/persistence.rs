//! Persistence store: one JSON record per map file, plus the autosave task.
//!
//! DESIGN
//! ======
//! Records live under a single directory. The file name is derived from the
//! map's file path alone (sanitized basename + SHA-256 prefix), so the same
//! map resolves to the same record in every session and two maps that share
//! a basename never collide.
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! record, so a crash mid-write leaves the previous record intact.
//!
//! The store itself never rate-limits. Rapid edits are coalesced by the
//! autosave task, which waits for a quiet period before writing.
//!
//! ERROR HANDLING
//! ==============
//! A missing or unreadable record means "never saved": `load` returns `None`
//! and logs anything other than not-found. Write failures are returned to
//! the caller (autosave logs them) and never retried automatically; the next
//! change schedules a fresh write.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mapcore::doc::AppState;
use mapcore::record::SavedMapState;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::now_ms;

/// Hex digits of the path hash kept in the record name.
const KEY_HASH_LEN: usize = 16;

/// Longest sanitized basename kept in the record name.
const KEY_NAME_MAX: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode map record: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

/// Record name for a map file: `<basename>-<hash>`.
#[must_use]
pub fn save_key(file_path: &str) -> String {
    let basename = Path::new(file_path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut name: String = basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .take(KEY_NAME_MAX)
        .collect();
    if name.is_empty() {
        name.push_str("map");
    }

    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    let digest = hasher.finalize();
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{name}-{}", &hash[..KEY_HASH_LEN])
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone)]
pub struct MapStore {
    dir: PathBuf,
}

impl MapStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the record for `file_path` lives.
    #[must_use]
    pub fn record_path(&self, file_path: &str) -> PathBuf {
        self.dir.join(format!("{}.json", save_key(file_path)))
    }

    /// Snapshot `state` and write it. `Ok(false)` when no map is loaded.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the record cannot be encoded or written.
    pub async fn save(&self, state: &AppState) -> Result<bool, StoreError> {
        let Some(record) = SavedMapState::capture(state, now_ms()) else {
            return Ok(false);
        };
        self.save_record(&record).await?;
        Ok(true)
    }

    /// Write `record` over any previous record for the same map.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the record cannot be encoded or written.
    pub async fn save_record(&self, record: &SavedMapState) -> Result<PathBuf, StoreError> {
        let path = self.record_path(&record.file_path);
        let body = serde_json::to_vec_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error(&self.dir))?;
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &body).await.map_err(io_error(&tmp))?;
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                debug!(error = %e, path = %tmp.display(), "temp record cleanup failed");
            }
            return Err(StoreError::Io { path, source });
        }
        debug!(path = %path.display(), bytes = body.len(), "map record written");
        Ok(path)
    }

    /// Saved record for `file_path`, or `None` if there is no usable one.
    pub async fn load(&self, file_path: &str) -> Option<SavedMapState> {
        let path = self.record_path(file_path);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file_path, "no saved record");
                return None;
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "map record unreadable; starting fresh");
                return None;
            }
        };
        match serde_json::from_slice::<SavedMapState>(&raw) {
            Ok(record) if record.file_path == file_path => Some(record),
            Ok(record) => {
                warn!(file_path, stored = %record.file_path, "map record belongs to another file; ignoring");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "map record unparseable; starting fresh");
                None
            }
        }
    }
}

// =============================================================================
// AUTOSAVE
// =============================================================================

/// Controller-side handle that feeds the autosave task.
pub struct AutosaveHandle {
    tx: watch::Sender<Option<SavedMapState>>,
}

impl AutosaveHandle {
    /// Queue `state` for saving once edits go quiet. A newer call replaces
    /// anything still waiting. No-op when no map is loaded.
    pub fn schedule(&self, state: &AppState) {
        let Some(record) = SavedMapState::capture(state, now_ms()) else {
            return;
        };
        self.tx.send_replace(Some(record));
    }
}

/// Spawn the debounced autosave task.
///
/// Each scheduled snapshot restarts a `debounce` timer; the newest snapshot
/// is written when the timer runs out. Dropping the handle flushes anything
/// pending and ends the task.
#[must_use]
pub fn spawn_autosave_task(store: MapStore, debounce: Duration) -> (AutosaveHandle, JoinHandle<()>) {
    let (tx, mut rx) = watch::channel::<Option<SavedMapState>>(None);
    info!(debounce_ms = debounce.as_millis() as u64, dir = %store.dir().display(), "autosave configured");

    let task = tokio::spawn(async move {
        let mut last_written: Option<SavedMapState> = None;
        while rx.changed().await.is_ok() {
            // Quiet period: every further change restarts the timer.
            let closed = loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break true;
                        }
                    }
                    () = tokio::time::sleep(debounce) => break false,
                }
            };
            let pending = rx.borrow_and_update().clone();
            if let Some(record) = pending {
                write_if_changed(&store, record, &mut last_written).await;
            }
            if closed {
                break;
            }
        }
        debug!("autosave task stopped");
    });

    (AutosaveHandle { tx }, task)
}

async fn write_if_changed(store: &MapStore, record: SavedMapState, last_written: &mut Option<SavedMapState>) {
    if last_written.as_ref().is_some_and(|prev| prev.same_content(&record)) {
        debug!(file_path = %record.file_path, "autosave skipped; nothing changed");
        return;
    }
    match store.save_record(&record).await {
        Ok(path) => {
            info!(path = %path.display(), "map autosaved");
            *last_written = Some(record);
        }
        Err(e) => error!(error = %e, file_path = %record.file_path, "autosave failed"),
    }
}
