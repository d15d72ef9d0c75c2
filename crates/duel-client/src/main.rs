//! Duel client binary.
//!
//! Wires the command controller to a demo board, keeps the board and its
//! drawn scene under audit, serves card definitions over HTTP, and reads
//! player input from the console.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `duel-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Deal the opening board and draw the scene
//! 4. Build the command registry and phase presenter
//! 5. Create the consistency auditor and diagnostic monitor
//! 6. Start periodic monitoring if enabled
//! 7. Open the card store and start the card service if enabled
//! 8. Enter the setup phase
//! 9. Run the console until `quit`

mod board;
mod console;
mod error;
mod handlers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use duel_audit::{ConsistencyAuditor, DiagnosticMonitor};
use duel_core::{ClientConfig, build_controller};
use duel_server::{AppState, CardStore, spawn_server};
use duel_types::PhaseName;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::board::{Board, Scene};
use crate::console::Console;
use crate::error::ClientError;

/// Config file looked up in the working directory.
const CONFIG_PATH: &str = "duel-config.yaml";

/// How long a command's animation keeps it in flight.
const ANIMATION: Duration = Duration::from_millis(400);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config().context("loading configuration")?;

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        commands = config.commands.len(),
        phases = config.phases.len(),
        debounce_ms = config.dispatch.debounce_ms,
        "duel-client starting"
    );

    // 3. Deal the opening board.
    let board = Board::new();
    let scene = Scene::new();
    scene.render(&board);
    info!(entities = board.snapshot().len(), nodes = scene.node_count(), "Board dealt");

    // 4. Build the controller.
    let mut presenter = build_controller(&config);
    let handlers = handlers::demo_handlers(&board, &scene, ANIMATION);

    // 5. Auditor and monitor.
    let auditor = ConsistencyAuditor::new(config.audit.clone());
    let monitor = Arc::new(DiagnosticMonitor::new(
        auditor,
        Arc::new(board.clone()),
        Arc::new(scene.clone()),
    ));

    // 6. Periodic monitoring.
    if config.monitor.enabled {
        monitor
            .start_monitoring(config.monitor.interval())
            .map_err(ClientError::from)?;
        info!(interval_ms = config.monitor.interval_ms, "Diagnostic monitor started");
    }

    // 7. Card service.
    let _service = if config.service.enabled {
        let store = CardStore::open(config.service.cards_path.clone())
            .await
            .map_err(ClientError::from)?;
        info!(cards = store.len(), path = %store.path().display(), "Card store opened");
        let state = Arc::new(AppState::with_monitor(store, Arc::clone(&monitor)));
        let (handle, addr) = spawn_server(&config.service, state)
            .await
            .map_err(ClientError::from)?;
        println!("card service on http://{addr}");
        Some(handle)
    } else {
        info!("Card service disabled");
        None
    };

    // 8. Enter the setup phase.
    let setup = PhaseName::from("setup");
    if presenter.phase_names().any(|p| *p == setup) {
        presenter.activate_phase(&setup, &handlers)?;
        board.set_phase(setup);
    } else {
        warn!("No setup phase configured; starting with no commands bound");
    }

    // 9. Console.
    Console::new(presenter, handlers, board, Arc::clone(&monitor))
        .run()
        .await?;

    monitor.stop_monitoring();
    info!("duel-client stopped");
    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], falling back to defaults.
fn load_config() -> Result<ClientConfig, ClientError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(ClientConfig::from_file(config_path)?)
    } else {
        let mut config = ClientConfig::default();
        config.service.apply_env_overrides();
        Ok(config)
    }
}
