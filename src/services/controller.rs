//! Controller view: owns the engine, turns console commands into engine
//! calls, and routes the resulting actions.
//!
//! DESIGN
//! ======
//! Every command ends in a list of [`Action`]s. [`Controller::dispatch`] is
//! the only place they are acted on: a durable change is broadcast to the
//! display and queued for autosave, a transient one is only broadcast.
//!
//! Console commands address cells and map pixels. They are replayed as
//! pointer gestures at the matching screen positions, so a console edit
//! takes exactly the path a mouse edit would (one history entry per
//! gesture, same clipping, same no-op rules).
//!
//! ERROR HANDLING
//! ==============
//! A rejected command is reported back to the operator and leaves the
//! session unchanged. Sync and autosave failures are logged; they never
//! undo an edit that was already applied.

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use mapcore::camera::Point;
use mapcore::doc::MapError;
use mapcore::engine::{Action, EngineCore};
use mapcore::fog::CellPos;
use mapcore::input::{Button, Modifiers, Tool};
use mapcore::record::DecodedImage;
use mapcore::viewport::VisibleRect;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use super::persistence::{AutosaveHandle, MapStore, StoreError};
use super::sync::{Publisher, Subscriber, SyncError};
use crate::console::{self, CalibrateCommand, Command, HELP};
use crate::state::project;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no map loaded (use 'load')")]
    NoMap,
}

/// What the operator sees after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Open or close the local display window.
    Display { open: bool },
    Quit,
}

impl Reply {
    fn changed(actions: &[Action]) -> Self {
        let text = if actions.contains(&Action::StateChanged) { "ok" } else { "nothing changed" };
        Self::Text(text.into())
    }
}

pub struct Controller {
    engine: EngineCore,
    store: MapStore,
    autosave: AutosaveHandle,
    state_pub: Publisher,
}

impl Controller {
    #[must_use]
    pub fn new(engine: EngineCore, store: MapStore, autosave: AutosaveHandle, state_pub: Publisher) -> Self {
        Self { engine, store, autosave, state_pub }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Act on the engine's answer to one call.
    pub fn dispatch(&mut self, actions: &[Action]) {
        let durable = actions.contains(&Action::StateChanged);
        if durable || actions.contains(&Action::Transient) {
            self.broadcast();
        }
        if durable {
            self.autosave.schedule(self.engine.state());
        }
        if actions.contains(&Action::RenderNeeded) {
            trace!("controller redraw");
        }
    }

    fn broadcast(&mut self) {
        match self.state_pub.publish(&project(self.engine.state())) {
            Ok(seq) => trace!(seq, "state broadcast"),
            Err(e) => warn!(error = %e, "state broadcast failed"),
        }
    }

    fn apply(&mut self, actions: Vec<Action>) -> Reply {
        self.dispatch(&actions);
        Reply::changed(&actions)
    }

    // =========================================================================
    // MAP LIFECYCLE
    // =========================================================================

    /// Open `image`, restoring its saved record when one exists.
    ///
    /// The map being left is saved first so its pending edits are not lost
    /// to the autosave queue switching files. A failed save is logged and
    /// the new map opens anyway.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Map`] if the image is too large to fog; the
    /// current session is then kept.
    pub async fn open_map(&mut self, image: &DecodedImage) -> Result<(), ControllerError> {
        if let Err(e) = self.save_now().await {
            error!(error = %e, file = %image.file_path, "saving the outgoing map failed; opening anyway");
        }
        let saved = self.store.load(&image.file_path).await;
        let restored = saved.is_some();
        let actions = self.engine.load_map(image, saved)?;
        let fog = &self.engine.state().fog;
        info!(file = %image.file_path, restored, rows = fog.rows(), cols = fog.cols(), "map opened");
        self.dispatch(&actions);
        Ok(())
    }

    /// Write the current session immediately. `Ok(false)` with no map loaded.
    ///
    /// # Errors
    ///
    /// [`StoreError`] from the store.
    pub async fn save_now(&self) -> Result<bool, StoreError> {
        self.store.save(self.engine.state()).await
    }

    /// The display reported what it shows.
    pub fn on_viewport(&mut self, rect: VisibleRect) {
        let actions = self.engine.set_player_viewport(rect);
        if !actions.is_empty() {
            debug!(x = rect.x, y = rect.y, width = rect.width, height = rect.height, "player viewport");
        }
        self.dispatch(&actions);
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Run one console command.
    ///
    /// # Errors
    ///
    /// [`ControllerError`] when the engine or the store rejects it.
    pub async fn execute(&mut self, command: Command) -> Result<Reply, ControllerError> {
        let reply = match command {
            Command::Load { path, width, height } => {
                self.open_map(&DecodedImage::new(path, width, height)).await?;
                Reply::Text(self.status())
            }
            Command::Paint { cells, reveal } => {
                let path = self.cell_path(&cells)?;
                let tool = if reveal { Tool::Reveal } else { Tool::Hide };
                let actions = self.gesture(tool, Modifiers::default(), &path);
                self.apply(actions)
            }
            Command::Brush(size) => {
                self.engine.set_brush_size(size);
                Reply::Text(format!("brush {}", self.engine.brush_size))
            }
            Command::Block { from, to, reveal } => {
                let path = self.cell_path(&[from, to])?;
                let actions = self.gesture(Tool::Block, Modifiers { shift: !reveal }, &path);
                self.apply(actions)
            }
            Command::Draw { points } => {
                self.require_map()?;
                let view = self.engine.state().view;
                let path: Vec<Point> = points.into_iter().map(|p| view.map_to_screen(p)).collect();
                let actions = self.gesture(Tool::Draw, Modifiers::default(), &path);
                self.apply(actions)
            }
            Command::Undo => {
                let actions = self.engine.undo();
                if let Some(op) = self.engine.history.last_undone().filter(|_| !actions.is_empty()) {
                    debug!(op = op.kind(), "undo");
                }
                self.apply(actions)
            }
            Command::Redo => {
                let actions = self.engine.redo();
                if let Some(op) = self.engine.history.last_done().filter(|_| !actions.is_empty()) {
                    debug!(op = op.kind(), "redo");
                }
                self.apply(actions)
            }
            Command::ResetFog => {
                let actions = self.engine.reset_fog();
                self.apply(actions)
            }
            Command::ClearFog => {
                let actions = self.engine.clear_fog();
                self.apply(actions)
            }
            Command::ClearDrawings => {
                let actions = self.engine.clear_drawings();
                self.apply(actions)
            }
            Command::GridSize(size) => {
                let actions = self.engine.set_grid_size(size)?;
                self.apply(actions)
            }
            Command::GridOffset { x, y } => {
                let actions = self.engine.set_grid_offset(x, y);
                self.apply(actions)
            }
            Command::GridVisible(visible) => {
                let actions = self.engine.set_grid_visible(visible);
                self.apply(actions)
            }
            Command::GridColor(color) => {
                let actions = self.engine.set_grid_color(color);
                self.apply(actions)
            }
            Command::GridOpacity(opacity) => {
                let actions = self.engine.set_grid_opacity(opacity)?;
                self.apply(actions)
            }
            Command::Calibrate(step) => self.calibrate(step)?,
            Command::Offset { x, y } => {
                let actions = self.engine.set_player_offset(Point::new(x, y));
                self.apply(actions)
            }
            Command::Ppi(value) => {
                let actions = self.engine.set_pixels_per_inch(value)?;
                self.apply(actions)
            }
            Command::PpiSave => {
                let actions = self.engine.save_calibration();
                self.apply(actions)
            }
            Command::PpiRestore => {
                let actions = self.engine.restore_calibration();
                self.dispatch(&actions);
                Reply::Text(format!("ppi {}", self.engine.state().calibration.pixels_per_inch))
            }
            Command::Display { open } => Reply::Display { open },
            Command::Save => {
                if self.save_now().await? {
                    Reply::Text("saved".into())
                } else {
                    return Err(ControllerError::NoMap);
                }
            }
            Command::Status => Reply::Text(self.status()),
            Command::Help => Reply::Text(HELP.into()),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    fn calibrate(&mut self, step: CalibrateCommand) -> Result<Reply, ControllerError> {
        let actions = match step {
            CalibrateCommand::Start => {
                self.require_map()?;
                self.engine.start_calibration()?
            }
            CalibrateCommand::Feedback(feedback) => self.engine.calibration_feedback(feedback)?,
            CalibrateCommand::Confirm => self.engine.confirm_calibration()?,
            CalibrateCommand::Cancel => self.engine.cancel_calibration()?,
        };
        self.dispatch(&actions);
        let size = self.engine.state().map.grid_size;
        Ok(Reply::Text(match self.engine.calibration.bounds() {
            Some((low, high)) => format!("grid {size} (searching {low}..={high})"),
            None => format!("grid {size}"),
        }))
    }

    fn require_map(&self) -> Result<(), ControllerError> {
        if self.engine.state().has_image() { Ok(()) } else { Err(ControllerError::NoMap) }
    }

    /// Screen positions of the centers of `cells`.
    fn cell_path(&self, cells: &[CellPos]) -> Result<Vec<Point>, ControllerError> {
        self.require_map()?;
        let state = self.engine.state();
        let half = f64::from(state.map.grid_size) / 2.0;
        Ok(cells
            .iter()
            .map(|&cell| {
                let origin = state.map.cell_origin(cell);
                state.view.map_to_screen(Point::new(origin.x + half, origin.y + half))
            })
            .collect())
    }

    /// Press at the first point, move through the rest, release at the last.
    fn gesture(&mut self, tool: Tool, modifiers: Modifiers, path: &[Point]) -> Vec<Action> {
        let Some((&first, rest)) = path.split_first() else {
            return Vec::new();
        };
        self.engine.set_tool(tool);
        let mut actions = self.engine.on_pointer_down(first, Button::Primary, modifiers);
        for &point in rest {
            actions.extend(self.engine.on_pointer_move(point));
        }
        actions.extend(self.engine.on_pointer_up(path.last().copied().unwrap_or(first)));
        actions
    }

    /// One-paragraph summary of the session.
    #[must_use]
    pub fn status(&self) -> String {
        let state = self.engine.state();
        let Some(file) = state.map.file_path.as_deref() else {
            return "no map loaded".into();
        };
        let fog = &state.fog;
        let total = fog.rows() * fog.cols();
        let mut out = format!("{file} ({}x{} px)\n", state.map.image_width, state.map.image_height);
        out.push_str(&format!(
            "grid {} px, {}x{} cells, {} of {total} revealed\n",
            state.map.grid_size,
            fog.cols(),
            fog.rows(),
            total - fog.occluded_count()
        ));
        out.push_str(&format!(
            "{} drawings, {} undo / {} redo\n",
            state.drawings.len(),
            self.engine.history.undo_len(),
            self.engine.history.redo_len()
        ));
        out.push_str(&format!(
            "ppi {} (saved {}), display at ({}, {})",
            state.calibration.pixels_per_inch,
            state.calibration.saved_pixels_per_inch,
            state.player_view_offset.x,
            state.player_view_offset.y
        ));
        if let Some(rect) = self.engine.player_viewport {
            out.push_str(&format!(" showing {:.0}x{:.0}", rect.width, rect.height));
        }
        out
    }
}

// =============================================================================
// EVENT LOOP
// =============================================================================

/// Forward stdin lines into a channel. The channel closes at end of input.
///
/// Reads on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown after `quit`.
#[must_use]
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Run the controller until `quit` or end of input.
///
/// `display` toggles an in-process display window; `None` when the display
/// runs elsewhere.
pub async fn run(
    controller: &mut Controller,
    mut lines: mpsc::Receiver<String>,
    mut viewport: Subscriber,
    display: Option<watch::Sender<bool>>,
) {
    let mut viewport_live = true;
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("console input closed");
                    break;
                };
                let command = match console::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match controller.execute(command).await {
                    Ok(Reply::Text(text)) => println!("{text}"),
                    Ok(Reply::Display { open }) => match &display {
                        Some(tx) => {
                            tx.send_replace(open);
                            println!("display {}", if open { "opened" } else { "closed" });
                        }
                        None => println!("the display runs as its own process here"),
                    },
                    Ok(Reply::Quit) => break,
                    Err(e) => println!("error: {e}"),
                }
            }
            rect = viewport.recv::<VisibleRect>(), if viewport_live => match rect {
                Ok(rect) => controller.on_viewport(rect),
                Err(SyncError::Closed) => viewport_live = false,
                Err(e) => warn!(error = %e, "viewport frame rejected"),
            },
        }
    }
}
