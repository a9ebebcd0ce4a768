//! Listener state and the atomic cell shared with stop handles

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::info;

/// The lifecycle states of a hotkey listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    /// Not listening; bindings may be registered
    #[default]
    Idle,
    /// Bindings are being registered with the host
    Registering,
    /// Blocked in the wait loop
    Listening,
    /// Wait loop exited, cleanup in progress
    Stopping,
    /// Terminal state
    Stopped,
}

impl ListenerState {
    fn as_u8(self) -> u8 {
        match self {
            ListenerState::Idle => 0,
            ListenerState::Registering => 1,
            ListenerState::Listening => 2,
            ListenerState::Stopping => 3,
            ListenerState::Stopped => 4,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ListenerState::Idle,
            1 => ListenerState::Registering,
            2 => ListenerState::Listening,
            3 => ListenerState::Stopping,
            _ => ListenerState::Stopped,
        }
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerState::Idle => write!(f, "Idle"),
            ListenerState::Registering => write!(f, "Registering"),
            ListenerState::Listening => write!(f, "Listening"),
            ListenerState::Stopping => write!(f, "Stopping"),
            ListenerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Listener state readable from any thread
///
/// Only the listener thread performs plain transitions. Other threads may
/// only claim the Listening -> Stopping edge through [`SharedState::request_stop`].
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<AtomicU8>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn get(&self) -> ListenerState {
        ListenerState::from_u8(self.inner.load(Ordering::SeqCst))
    }

    /// Unconditionally move to `new_state`, returning the previous state
    pub fn transition_to(&self, new_state: ListenerState) -> ListenerState {
        let old_state = ListenerState::from_u8(self.inner.swap(new_state.as_u8(), Ordering::SeqCst));
        if old_state != new_state {
            info!(from = %old_state, to = %new_state, "listener state transition");
        }
        old_state
    }

    /// Claim the Listening -> Stopping transition
    ///
    /// Returns false if the listener was not listening, including when another
    /// caller already claimed the transition.
    pub fn request_stop(&self) -> bool {
        let claimed = self
            .inner
            .compare_exchange(
                ListenerState::Listening.as_u8(),
                ListenerState::Stopping.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if claimed {
            info!(from = %ListenerState::Listening, to = %ListenerState::Stopping, "listener state transition");
        }
        claimed
    }
}
