//! Hotkey module for global keyboard shortcuts
//!
//! Bindings are registered with a host backend and a listener blocks on
//! the backend's notification queue:
//! - Windows: `RegisterHotKey` and the thread message queue
//! - macOS: CGEventTap (requires Accessibility permission)
//! - anywhere: the in-process [`VirtualHost`]

mod backend;
mod binding;
mod error;
mod keys;
mod listener;
mod virtual_host;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

pub use backend::{HotkeyBackend, Notification, Wakeup};
pub use binding::{BindingAllocator, BindingId, HotkeyBinding};
pub use error::{
    BackendError, DeregistrationWarning, ListenerError, RegistrationCause, RegistrationError,
};
pub use keys::{KeyCode, KeyCombo, KeyParseError, Modifiers};
pub use listener::{HotkeyListener, RunOutcome, StopHandle};
pub use virtual_host::{VirtualBackend, VirtualHost};

#[cfg(target_os = "macos")]
pub use macos::MacosBackend;

#[cfg(target_os = "windows")]
pub use windows::WindowsBackend;

/// Create the host backend for the calling thread
///
/// Must be called on the thread that will run the listener, since hotkey
/// notifications are delivered to the registering thread.
pub fn platform_backend() -> Result<Box<dyn HotkeyBackend>, BackendError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsBackend::new()))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacosBackend::new()))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Err(BackendError::Unsupported(
            "global hotkeys are not available on this platform".to_string(),
        ))
    }
}
