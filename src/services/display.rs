//! Display view: keeps a read-only replica of the session and reports back
//! which part of the map it shows.
//!
//! The window is opened and closed through a `watch` flag. Each open starts
//! a fresh subscription, so the replica begins at the controller's latest
//! snapshot instead of waiting for the next edit.

#[cfg(test)]
#[path = "display_test.rs"]
mod tests;

use frames::Topic;
use mapcore::doc::AppState;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::sync::{Publisher, Subscriber, SyncBus, SyncError};
use crate::state::DisplayWindow;

/// Run the display until `control` is dropped or the bus closes.
pub async fn run(mut window: DisplayWindow, bus: SyncBus, mut control: watch::Receiver<bool>) -> DisplayWindow {
    let mut viewport_pub = bus.publisher(Topic::Viewport);
    let mut state_sub: Option<Subscriber> = None;
    toggle(&mut window, &bus, &mut state_sub, *control.borrow_and_update());

    loop {
        tokio::select! {
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                let open = *control.borrow_and_update();
                toggle(&mut window, &bus, &mut state_sub, open);
            }
            snapshot = recv_state(&mut state_sub) => match snapshot {
                Ok(snapshot) => apply(&mut window, &mut viewport_pub, snapshot),
                Err(SyncError::Closed) => break,
                Err(e) => warn!(error = %e, "state frame rejected"),
            },
        }
    }
    window
}

fn toggle(window: &mut DisplayWindow, bus: &SyncBus, state_sub: &mut Option<Subscriber>, open: bool) {
    if open == window.is_open() {
        return;
    }
    if open {
        window.open();
        *state_sub = Some(bus.subscriber(Topic::State));
        info!("display opened");
    } else {
        window.close();
        *state_sub = None;
        info!("display closed");
    }
}

/// Next state snapshot; pends forever while the window is closed.
async fn recv_state(state_sub: &mut Option<Subscriber>) -> Result<AppState, SyncError> {
    match state_sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

fn apply(window: &mut DisplayWindow, viewport_pub: &mut Publisher, snapshot: AppState) {
    let rect = window.apply(snapshot);
    if let Some(replica) = window.replica() {
        debug!(
            rows = replica.fog.rows(),
            cols = replica.fog.cols(),
            drawings = replica.drawings.len(),
            laser = replica.laser.len(),
            "replica updated"
        );
    }
    let Some(rect) = rect else {
        return;
    };
    if let Err(e) = viewport_pub.publish(&rect) {
        warn!(error = %e, "viewport report failed");
    }
}
