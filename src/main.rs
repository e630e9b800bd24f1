//! inputlock-daemon: blocks keyboard and pointer input until an unlock shortcut
//!
//! This daemon runs as a LaunchAgent and provides:
//! - A system-wide CGEventTap that swallows input while locked
//! - A debounced lock state machine fed from a single command queue
//! - Tap recovery after sleep, display sleep and the screensaver
//! - IPC server for menu bar app communication
//!
//! Out of scope here: drawing the overlay, menus and onboarding. Those live in
//! the UI process and follow the daemon over IPC.

mod config;
mod engine;
mod events;
mod ipc;
mod lifecycle;
mod lock;
mod permission;
mod platform;
mod resilience;
mod shortcut;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::InterceptionEngine;
use crate::events::LockEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::lock::{Command, Controller, LockStateMachine, TimedOverlay};
use crate::permission::{PermissionGate, SETTINGS_URL};
use crate::platform::{MainLoop, SystemNotifications, SystemPermission, SystemTapBackend};
use crate::resilience::{NotificationSource, ResilienceMonitor};
use crate::shortcut::{ShortcutCell, ShortcutStore};

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_BUS_DEPTH: usize = 64;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "inputlock-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.debounce, "configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    // Everything that changes lock state goes through this queue
    let (command_tx, command_rx) = mpsc::channel::<Command>(COMMAND_QUEUE_DEPTH);

    // Lifecycle notifications are delivered on the main thread's run loop
    let mut notifications = SystemNotifications::default();
    if let Err(e) = notifications.subscribe(ResilienceMonitor::new(command_tx.clone())) {
        warn!(?e, "continuing without sleep/wake tap recovery");
    }

    let main_loop = MainLoop::current();
    let releaser = main_loop.releaser();
    let daemon = runtime.spawn(async move {
        let _releaser = releaser;
        run(config, command_tx, command_rx).await
    });

    main_loop.park();
    let result = runtime.block_on(daemon).context("daemon task panicked")?;

    drop(notifications);
    info!("inputlock-daemon stopped");
    result
}

async fn run(
    config: Config,
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
) -> Result<()> {
    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Controller -> IPC subscribers and the overlay renderer
    let (event_tx, _event_rx) = broadcast::channel::<LockEvent>(EVENT_BUS_DEPTH);

    let store = ShortcutStore::new(config.shortcut_path.clone());
    let shortcut = Arc::new(ShortcutCell::new(store.load()));

    let permission = PermissionGate::new(Arc::new(SystemPermission::default()));
    if !permission.is_granted() {
        warn!(
            settings = SETTINGS_URL,
            "Accessibility permission missing - locking will prompt for it"
        );
    }

    let engine = InterceptionEngine::new(
        SystemTapBackend::default(),
        permission.clone(),
        Arc::clone(&shortcut),
        command_tx.clone(),
    );
    let machine = LockStateMachine::new(
        engine,
        TimedOverlay::new(event_tx.clone(), config.overlay_animation),
        config.debounce,
        command_tx.clone(),
        event_tx.clone(),
    );
    let controller = Controller::new(
        machine,
        shortcut,
        store,
        permission,
        config.permission_poll_interval,
        command_tx.clone(),
        event_tx.clone(),
    );
    let mut controller_task = tokio::spawn(controller.run(command_rx));

    // Create IPC server
    let server = Server::new(&config.socket_path, command_tx.clone(), event_tx.clone())?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    let controller_exited = tokio::select! {
        _ = &mut controller_task => {
            error!("controller exited unexpectedly");
            true
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
            false
        }

        _ = log_events(event_tx.subscribe()) => false,

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
            false
        }
    };

    // Cleanup
    info!("shutting down...");

    if !controller_exited {
        if command_tx.send(Command::Shutdown).await.is_err() {
            warn!("controller already gone");
        }
        if let Err(e) = controller_task.await {
            error!(?e, "controller task failed");
        }
    }

    server.shutdown().await;

    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<LockEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!(%event, "lock event"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "lock event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
