//! shortcut-daemon: background listener for global keyboard shortcuts
//!
//! Registers the configured shortcuts on a dedicated thread, forwards every
//! press to the async side as a [`ShortcutEvent`], and exits when the quit
//! shortcut fires or on SIGINT/SIGTERM.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shortcut_daemon::config::{Action, Config, ResolvedBinding};
use shortcut_daemon::events::{EventSink, ShortcutEvent, StopReason};
use shortcut_daemon::hotkey::{self, HotkeyListener, StopHandle};
use shortcut_daemon::state::ListenerState;
use shortcut_daemon::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; it carries the default log filter
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "shortcut-daemon starting"
    );

    let bindings = config
        .resolve_bindings()
        .context("invalid binding configuration")?;
    for resolved in &bindings {
        info!(binding = %resolved.binding, action = %resolved.action, "binding configured");
    }

    // Listener thread -> event loop
    let (event_tx, mut event_rx) = mpsc::channel::<ShortcutEvent>(32);
    // Listener thread hands back its stop handle once registered
    let (ready_tx, ready_rx) = oneshot::channel::<Result<StopHandle>>();

    let listener_thread = thread::Builder::new()
        .name("hotkey-listener".to_string())
        .spawn(move || run_listener(bindings, EventSink::new(event_tx), ready_tx))
        .context("failed to spawn listener thread")?;

    let stop = match ready_rx.await {
        Ok(Ok(stop)) => stop,
        Ok(Err(e)) => {
            let _ = listener_thread.join();
            return Err(e);
        }
        Err(_) => {
            let _ = listener_thread.join();
            return Err(anyhow!("listener thread exited before registering"));
        }
    };

    let shutdown = ShutdownSignal::new();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = async {
            while let Some(event) = event_rx.recv().await {
                info!(%event, "shortcut event");
                match event {
                    ShortcutEvent::Fired { action: Action::Toggle, .. } => {
                        info!("toggle requested");
                    }
                    ShortcutEvent::Fired { action: Action::Quit, .. } => {
                        info!("quit requested");
                    }
                    ShortcutEvent::ListenerStopped { .. } => break,
                }
            }
        } => {
            info!("event stream ended");
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    request_stop(&stop).await;
    // Drain so a blocked emit on the listener thread cannot stall the join
    event_rx.close();
    tokio::task::spawn_blocking(move || listener_thread.join())
        .await
        .context("failed to join listener thread")?
        .map_err(|_| anyhow!("listener thread panicked"))?;

    info!("shortcut-daemon stopped");

    Ok(())
}

/// Stop the listener, waiting out the gap between registration and `run`
///
/// A stop request is only honoured while listening, and the handle is
/// handed over just before the thread enters its wait loop.
async fn request_stop(stop: &StopHandle) {
    loop {
        if stop.stop() {
            return;
        }
        match stop.state() {
            ListenerState::Stopping | ListenerState::Stopped => return,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

/// Body of the listener thread
///
/// The backend is created here because hotkey notifications are delivered
/// to the thread that registered them.
fn run_listener(
    bindings: Vec<ResolvedBinding>,
    sink: EventSink,
    ready_tx: oneshot::Sender<Result<StopHandle>>,
) {
    let backend = match hotkey::platform_backend() {
        Ok(backend) => backend,
        Err(e) => {
            error!(?e, "no hotkey backend available");
            let _ = ready_tx.send(Err(anyhow!(e).context("failed to create hotkey backend")));
            return;
        }
    };

    let actions: HashMap<u32, Action> = bindings
        .iter()
        .map(|r| (r.binding.id().get(), r.action))
        .collect();

    let mut listener = HotkeyListener::new(backend);
    if let Some(quit) = bindings.iter().find(|r| r.action == Action::Quit) {
        listener = listener.with_stop_binding(quit.binding.id());
    } else {
        warn!("no quit binding configured, only signals will stop the daemon");
    }

    if let Err(e) = listener.register(bindings.iter().map(|r| r.binding)) {
        error!(%e, "failed to register hotkeys");
        let _ = ready_tx.send(Err(anyhow!(e).context("failed to register hotkeys")));
        return;
    }

    if ready_tx.send(Ok(listener.stop_handle())).is_err() {
        warn!("main task went away before listening started");
        return;
    }

    let result = listener.run(|id| {
        if let Some(action) = actions.get(&id.get()) {
            sink.emit(ShortcutEvent::Fired {
                id: id.get(),
                action: *action,
            });
        }
    });

    match result {
        Ok(outcome) => {
            sink.emit(ShortcutEvent::ListenerStopped {
                reason: StopReason::from(outcome),
            });
        }
        Err(e) => error!(%e, "hotkey listener failed"),
    }
}
