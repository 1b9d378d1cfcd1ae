//! clipswap-daemon: Background clipboard swap utility
//!
//! This daemon runs in the user session and provides:
//! - A single global hotkey (default Ctrl+B)
//! - The clipboard swap: copy the selection, restore the previous
//!   clipboard, paste it over the selection, leave the selection on
//!   the clipboard
//! - A one-shot capture flow to rebind the hotkey
//! - IPC server for the settings window

mod config;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod platform;
mod settings;
mod state;
mod swap;

#[cfg(test)]
mod testing;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::BinderEvent;
use crate::hotkey::{CaptureHub, GlobalHotkeyRegistry};
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::platform::SystemBackend;
use crate::settings::Settings;
use crate::state::HotkeyBinder;
use crate::swap::ClipboardSwapper;

/// Interval between platform event pumps
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "clipswap-daemon starting");

    let start_time = Instant::now();

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.ipc_endpoint, ?config.settings_path, "configuration loaded");

    let settings = Settings::load(&config.settings_path).unwrap_or_else(|e| {
        warn!(?e, "failed to load settings, using defaults");
        Settings::default()
    });
    let initial = settings.combination();

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // IPC server -> binder
    let (command_tx, command_rx) = mpsc::channel(32);
    // OS hotkey callback -> binder
    let (hotkey_tx, hotkey_rx) = mpsc::unbounded_channel();
    // Binder -> subscribed IPC clients
    let (event_tx, _event_rx) = broadcast::channel::<BinderEvent>(64);

    let registry =
        GlobalHotkeyRegistry::new(hotkey_tx).context("failed to create global hotkey manager")?;
    let backend = SystemBackend::new().context("failed to open system clipboard")?;
    let swapper = ClipboardSwapper::new(backend, config.swap);
    let hub = CaptureHub::new();

    let mut binder = HotkeyBinder::new(
        initial,
        registry,
        swapper,
        hub.clone(),
        event_tx.clone(),
        config.capture_timeout,
    );

    if let Err(e) = binder.apply_binding(initial) {
        error!(%e, "failed to register hotkey");
        warn!("continuing without an active hotkey - rebind from the settings window");
    }

    let server = Server::new(
        &config.ipc_endpoint,
        ServerContext {
            commands: command_tx,
            hub,
            events: event_tx,
            settings_path: config.settings_path.clone(),
            start_time,
        },
    )?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the binder (capture flow and hotkey presses)
        _ = binder.run(command_rx, hotkey_rx) => {
            info!("binder exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Deliver OS hotkey messages on this thread
        _ = async {
            let mut interval = tokio::time::interval(PUMP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                platform::pump_events();
            }
        } => {}

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    binder.shutdown();

    info!("clipswap-daemon stopped");

    Ok(())
}
