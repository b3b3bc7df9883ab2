use std::time::Duration;

use frames::Topic;
use mapcore::doc::AppState;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::*;
use crate::services::persistence::spawn_autosave_task;
use crate::services::sync::SyncBus;

struct Harness {
    controller: Controller,
    bus: SyncBus,
    store: MapStore,
    autosave: JoinHandle<()>,
}

fn harness() -> Harness {
    let store = MapStore::new(std::env::temp_dir().join(format!("battlemap-ctl-{}", Uuid::new_v4())));
    attach(store)
}

fn attach(store: MapStore) -> Harness {
    let bus = SyncBus::default();
    // Long debounce: only explicit saves and the final flush write.
    let (handle, autosave) = spawn_autosave_task(store.clone(), Duration::from_secs(60));
    let controller = Controller::new(EngineCore::new(), store.clone(), handle, bus.publisher(Topic::State));
    Harness { controller, bus, store, autosave }
}

impl Harness {
    async fn run(&mut self, line: &str) -> Reply {
        let command = console::parse(line).expect("parse").expect("command");
        self.controller.execute(command).await.expect("execute")
    }

    async fn fail(&mut self, line: &str) -> ControllerError {
        let command = console::parse(line).expect("parse").expect("command");
        self.controller.execute(command).await.expect_err("command should fail")
    }

    fn state(&self) -> &AppState {
        self.controller.engine.state()
    }

    /// Flush autosave and remove the store directory.
    async fn finish(self) {
        drop(self.controller);
        self.autosave.await.expect("autosave task");
        if let Err(e) = std::fs::remove_dir_all(self.store.dir()) {
            assert_eq!(e.kind(), std::io::ErrorKind::NotFound, "cleanup failed: {e}");
        }
    }
}

async fn next_state(sub: &mut Subscriber) -> AppState {
    tokio::time::timeout(Duration::from_secs(2), sub.recv::<AppState>())
        .await
        .expect("state frame in time")
        .expect("state frame")
}

fn text(reply: &Reply) -> &str {
    match reply {
        Reply::Text(text) => text,
        other => panic!("expected text reply, got {other:?}"),
    }
}

// =============================================================================
// map lifecycle
// =============================================================================

#[tokio::test]
async fn load_broadcasts_projected_state() {
    let mut h = harness();
    let mut sub = h.bus.subscriber(Topic::State);
    let reply = h.run("load dungeon.png 800 600").await;
    assert!(text(&reply).starts_with("dungeon.png (800x600 px)"));

    let snapshot = next_state(&mut sub).await;
    assert_eq!(snapshot.map.file_path.as_deref(), Some("dungeon.png"));
    assert_eq!((snapshot.fog.rows(), snapshot.fog.cols()), (12, 16));
    h.finish().await;
}

#[tokio::test]
async fn reopening_restores_saved_session() {
    let mut h = harness();
    h.run("load keep.png 800 600").await;
    h.run("grid size 100").await;
    h.run("reveal 3 2").await;
    assert_eq!(text(&h.run("save").await), "saved");
    let store = h.store.clone();
    drop(h.controller);
    h.autosave.await.expect("autosave task");

    let mut h = attach(store);
    h.run("load keep.png 800 600").await;
    assert_eq!(h.state().map.grid_size, 100);
    assert_eq!(h.state().fog.is_occluded(2, 3), Some(false));
    assert!(!h.controller.engine.history.can_undo());
    h.finish().await;
}

#[tokio::test]
async fn switching_maps_saves_the_outgoing_one() {
    let mut h = harness();
    h.run("load a.png 400 400").await;
    h.run("reveal 0 0").await;
    h.run("load b.png 400 400").await;

    let record = h.store.load("a.png").await.expect("a.png saved on switch");
    assert_eq!(record.fog.is_occluded(0, 0), Some(false));
    assert_eq!(h.state().map.file_path.as_deref(), Some("b.png"));
    h.finish().await;
}

#[tokio::test]
async fn failed_outgoing_save_still_opens_next_map() {
    let store = MapStore::new(std::env::temp_dir().join(format!("battlemap-ctl-{}", Uuid::new_v4())));
    let mut h = attach(store);
    h.run("load a.png 400 400").await;
    h.run("reveal 0 0").await;
    // A regular file where the store directory should be.
    std::fs::write(h.store.dir(), b"").expect("blocker");

    let reply = h.run("load b.png 400 400").await;
    assert!(text(&reply).starts_with("b.png"));
    assert_eq!(h.state().map.file_path.as_deref(), Some("b.png"));
    std::fs::remove_file(h.store.dir()).expect("remove blocker");
    h.finish().await;
}

#[tokio::test]
async fn oversized_map_is_rejected_and_session_kept() {
    let mut h = harness();
    h.run("load a.png 400 400").await;
    let err = h.fail("load huge.png 4000000000 4000000000").await;
    assert!(matches!(err, ControllerError::Map(MapError::Fog(_))), "{err:?}");
    assert_eq!(h.state().map.file_path.as_deref(), Some("a.png"));
    h.finish().await;
}

#[tokio::test]
async fn edits_without_map_are_refused() {
    let mut h = harness();
    assert!(matches!(h.fail("reveal 0 0").await, ControllerError::NoMap));
    assert!(matches!(h.fail("block 0 0 1 1").await, ControllerError::NoMap));
    assert!(matches!(h.fail("draw 0 0 5 5").await, ControllerError::NoMap));
    assert!(matches!(h.fail("save").await, ControllerError::NoMap));
    assert!(matches!(h.fail("calibrate start").await, ControllerError::NoMap));
    assert_eq!(text(&h.run("status").await), "no map loaded");
    h.finish().await;
}

// =============================================================================
// editing
// =============================================================================

#[tokio::test]
async fn reveal_path_is_one_history_entry() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("grid size 100").await;
    let mut sub = h.bus.subscriber(Topic::State);

    assert_eq!(text(&h.run("reveal 1 1 2 1 3 1").await), "ok");
    for col in 1..=3 {
        assert_eq!(h.state().fog.is_occluded(1, col), Some(false), "col {col}");
    }
    assert_eq!(h.state().fog.is_occluded(0, 1), Some(true));
    assert_eq!(h.controller.engine.history.undo_len(), 1);

    // The subscriber started from the latest snapshot and then saw the edit.
    let mut latest = next_state(&mut sub).await;
    while latest.fog.is_occluded(1, 3) != Some(false) {
        latest = next_state(&mut sub).await;
    }
    assert_eq!(latest.fog, h.state().fog);
    h.finish().await;
}

#[tokio::test]
async fn brush_size_applies_to_paint() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("grid size 100").await;
    assert_eq!(text(&h.run("brush 3").await), "brush 3");
    h.run("reveal 2 2").await;
    let revealed = h.state().fog.rows() * h.state().fog.cols() - h.state().fog.occluded_count();
    assert_eq!(revealed, 9);
    h.finish().await;
}

#[tokio::test]
async fn block_hide_covers_rectangle() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("grid size 100").await;
    h.run("clearfog").await;
    h.run("block 2 2 0 0 hide").await;

    let fog = &h.state().fog;
    assert_eq!(fog.occluded_count(), 9);
    assert_eq!(fog.is_occluded(2, 2), Some(true));
    assert_eq!(fog.is_occluded(3, 3), Some(false));
    h.finish().await;
}

#[tokio::test]
async fn block_fully_off_map_changes_nothing() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("grid size 100").await;
    assert_eq!(text(&h.run("block 20 20 30 30").await), "nothing changed");
    assert!(!h.controller.engine.history.can_undo());
    h.finish().await;
}

#[tokio::test]
async fn draw_follows_view_transform() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("draw 10 20 30 40 50 60").await;
    let drawing = &h.state().drawings[0];
    assert_eq!(drawing.points, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0), Point::new(50.0, 60.0)]);
    h.finish().await;
}

#[tokio::test]
async fn undo_and_redo_replies() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    assert_eq!(text(&h.run("undo").await), "nothing changed");
    h.run("draw 0 0 10 10").await;
    assert_eq!(text(&h.run("undo").await), "ok");
    assert!(h.state().drawings.is_empty());
    assert_eq!(text(&h.run("redo").await), "ok");
    assert_eq!(h.state().drawings.len(), 1);
    h.finish().await;
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    assert!(matches!(h.fail("grid size 0").await, ControllerError::Map(MapError::InvalidGridSize(_))));
    assert!(matches!(h.fail("grid opacity 2").await, ControllerError::Map(MapError::InvalidOpacity(_))));
    assert!(matches!(h.fail("ppi -5").await, ControllerError::Map(MapError::InvalidPixelsPerInch(_))));
    assert_eq!(h.state().map.grid_size, mapcore::consts::DEFAULT_GRID_SIZE);
    h.finish().await;
}

// =============================================================================
// calibration and display
// =============================================================================

#[tokio::test]
async fn calibration_search_narrows_then_confirms() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    let started = h.run("calibrate start").await;
    assert!(text(&started).contains("searching"));

    h.run("calibrate toobig").await;
    let size = h.state().map.grid_size;
    assert!(size < mapcore::consts::DEFAULT_GRID_SIZE);
    assert!(matches!(h.fail("grid size 70").await, ControllerError::Map(MapError::CalibrationActive)));

    assert_eq!(text(&h.run("calibrate confirm").await), format!("grid {size}"));
    assert!(matches!(h.fail("calibrate toosmall").await, ControllerError::Map(MapError::CalibrationInactive)));
    h.finish().await;
}

#[tokio::test]
async fn ppi_save_and_restore() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("ppi 120").await;
    h.run("ppi save").await;
    h.run("ppi 80").await;
    assert_eq!(text(&h.run("ppi restore").await), "ppi 120");
    h.finish().await;
}

#[tokio::test]
async fn viewport_report_shows_in_status() {
    let mut h = harness();
    h.run("load arena.png 800 600").await;
    h.run("offset 40 20").await;
    h.controller.on_viewport(VisibleRect { x: 40.0, y: 20.0, width: 480.0, height: 270.0 });
    let status = h.run("status").await;
    assert!(text(&status).contains("display at (40, 20) showing 480x270"), "{status:?}");
    h.finish().await;
}

#[tokio::test]
async fn display_and_quit_are_passed_up() {
    let mut h = harness();
    assert_eq!(h.run("display open").await, Reply::Display { open: true });
    assert_eq!(h.run("display close").await, Reply::Display { open: false });
    assert_eq!(h.run("quit").await, Reply::Quit);
    h.finish().await;
}

// =============================================================================
// event loop
// =============================================================================

#[tokio::test]
async fn run_applies_lines_and_viewport_until_quit() {
    let mut h = harness();
    let (tx, rx) = mpsc::channel(8);
    let (display_tx, display_rx) = watch::channel(false);
    let mut viewport_pub = h.bus.publisher(Topic::Viewport);
    viewport_pub
        .publish(&VisibleRect { x: 0.0, y: 0.0, width: 100.0, height: 50.0 })
        .expect("viewport publish");

    for line in ["load arena.png 800 600", "not-a-command", "display open", "quit", "clearfog"] {
        tx.send(line.to_owned()).await.expect("send");
    }
    let viewport = h.bus.subscriber(Topic::Viewport);
    tokio::time::timeout(Duration::from_secs(2), run(&mut h.controller, rx, viewport, Some(display_tx)))
        .await
        .expect("loop ends at quit");

    assert!(h.state().has_image());
    assert!(*display_rx.borrow());
    // Nothing after quit runs.
    assert!(h.state().fog.occluded_count() > 0);
    h.finish().await;
}
