//! Host hotkey backend interface
//!
//! A backend owns the host's side of global shortcuts: registering key
//! combinations by id, blocking until the next notification, and removing
//! registrations. It also hands out a [`Wakeup`] that other threads use to
//! post a sentinel into the same queue the blocking wait consumes.

use std::sync::Arc;

use super::binding::{BindingId, HotkeyBinding};
use super::error::BackendError;

/// A notification delivered by the host's wait queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The shortcut registered under this id was pressed
    Hotkey(BindingId),
    /// Sentinel posted through a [`Wakeup`]
    Wake,
    /// The host queue is gone; no further notifications will arrive
    Closed,
}

/// Posts a wake sentinel into a backend's wait queue from any thread
pub trait Wakeup: Send + Sync {
    fn wake(&self) -> Result<(), BackendError>;
}

/// Host capability set used by the listener
///
/// Backends are driven from a single thread: the one that registers
/// bindings is the one that waits for them. Only the [`Wakeup`] crosses
/// threads.
pub trait HotkeyBackend {
    /// Register a global shortcut with the host
    fn register(&mut self, binding: &HotkeyBinding) -> Result<(), BackendError>;

    /// Remove a previously registered shortcut
    fn unregister(&mut self, id: BindingId) -> Result<(), BackendError>;

    /// Block until the next notification arrives; there is no timeout
    fn next_notification(&mut self) -> Notification;

    /// A handle that wakes [`HotkeyBackend::next_notification`]
    fn wakeup(&self) -> Arc<dyn Wakeup>;
}

impl<B: HotkeyBackend + ?Sized> HotkeyBackend for Box<B> {
    fn register(&mut self, binding: &HotkeyBinding) -> Result<(), BackendError> {
        (**self).register(binding)
    }

    fn unregister(&mut self, id: BindingId) -> Result<(), BackendError> {
        (**self).unregister(id)
    }

    fn next_notification(&mut self) -> Notification {
        (**self).next_notification()
    }

    fn wakeup(&self) -> Arc<dyn Wakeup> {
        (**self).wakeup()
    }
}
