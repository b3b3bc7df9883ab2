mod config;
mod console;
mod services;
mod state;

use std::process::ExitCode;

use frames::Topic;
use mapcore::engine::EngineCore;
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, Role};
use services::controller::{self, Controller};
use services::persistence::{MapStore, spawn_autosave_task};
use services::sync::SyncBus;
use services::{bridge, display};
use state::DisplayWindow;

#[tokio::main]
async fn main() -> ExitCode {
    // Read before the subscriber so RUST_LOG from .env applies.
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = dotenv {
        debug!(error = %e, "no .env loaded");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(role = ?config.role, store = %config.store_dir.display(), "battlemap starting");

    match config.role {
        Role::Local | Role::Controller => run_controller(&config).await,
        Role::Display => run_display(&config).await,
    }
}

/// Controller process; with `Role::Local` the display window runs in-process.
async fn run_controller(config: &Config) -> ExitCode {
    let bus = SyncBus::default();
    let store = MapStore::new(&config.store_dir);
    let (autosave, autosave_task) = spawn_autosave_task(store.clone(), config.save_debounce);
    let engine = EngineCore::with_history_capacity(config.history_capacity);
    let mut ctl = Controller::new(engine, store, autosave, bus.publisher(Topic::State));
    let viewport = bus.subscriber(Topic::Viewport);

    let (display_ctl, display_task, bridge_task) = if config.role == Role::Local {
        let (tx, rx) = watch::channel(true);
        let window = DisplayWindow::new(config.display_width, config.display_height);
        (Some(tx), Some(tokio::spawn(display::run(window, bus.clone(), rx))), None)
    } else {
        let addr = config.sync_addr.clone();
        let bus = bus.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = bridge::serve_controller(&addr, bus).await {
                error!(error = %e, %addr, "sync bridge failed to start");
            }
        });
        (None, None, Some(task))
    };

    info!("type 'help' for commands");
    controller::run(&mut ctl, controller::spawn_stdin_reader(), viewport, display_ctl).await;

    // Dropping the controller drops the autosave handle, which flushes.
    drop(ctl);
    let mut code = ExitCode::SUCCESS;
    if let Err(e) = autosave_task.await {
        error!(error = %e, "autosave task panicked");
        code = ExitCode::FAILURE;
    }
    if let Some(task) = display_task {
        if let Err(e) = task.await {
            error!(error = %e, "display task panicked");
            code = ExitCode::FAILURE;
        }
    }
    if let Some(task) = bridge_task {
        task.abort();
    }
    info!("battlemap stopped");
    code
}

/// Display-only process: mirror the controller until Ctrl-C.
async fn run_display(config: &Config) -> ExitCode {
    let bus = SyncBus::default();
    let addr = config.sync_addr.clone();
    let link = tokio::spawn({
        let bus = bus.clone();
        async move { bridge::connect_display(&addr, bus).await }
    });

    let (control, rx) = watch::channel(true);
    let window = DisplayWindow::new(config.display_width, config.display_height);
    let display_task = tokio::spawn(display::run(window, bus, rx));

    let mut code = ExitCode::SUCCESS;
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl-C");
        code = ExitCode::FAILURE;
    }
    drop(control);
    if let Err(e) = display_task.await {
        error!(error = %e, "display task panicked");
        code = ExitCode::FAILURE;
    }
    link.abort();
    info!("display stopped");
    code
}
