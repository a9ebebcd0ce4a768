//! Events emitted from the listener thread
//!
//! The listener callback runs on a plain OS thread; [`EventSink`] carries
//! what it sees into the async side of the daemon.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::Action;
use crate::hotkey::RunOutcome;

/// Why the listener stopped, in serializable form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    QuitBinding,
    StopRequested,
    HostClosed,
}

impl From<RunOutcome> for StopReason {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::StopBinding(_) => StopReason::QuitBinding,
            RunOutcome::StopRequested => StopReason::StopRequested,
            RunOutcome::BackendClosed => StopReason::HostClosed,
        }
    }
}

/// Events emitted by the listener thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShortcutEvent {
    /// A registered shortcut was pressed
    Fired {
        /// Binding id
        id: u32,
        /// Configured action for the binding
        action: Action,
    },

    /// The listener loop ended and all bindings were released
    ListenerStopped { reason: StopReason },
}

impl std::fmt::Display for ShortcutEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShortcutEvent::Fired { id, action } => write!(f, "FIRED #{} ({})", id, action),
            ShortcutEvent::ListenerStopped { reason } => {
                write!(f, "LISTENER_STOPPED ({:?})", reason)
            }
        }
    }
}

/// Sends events from a blocking thread into a tokio channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ShortcutEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ShortcutEvent>) -> Self {
        Self { tx }
    }

    /// Send an event, blocking while the channel is full
    ///
    /// Must not be called from inside an async context. Returns false if the
    /// receiver is gone.
    pub fn emit(&self, event: ShortcutEvent) -> bool {
        if self.tx.blocking_send(event).is_err() {
            warn!("failed to send shortcut event - channel closed?");
            return false;
        }
        true
    }
}
