//! Win32 hotkey backend
//!
//! Uses `RegisterHotKey` with a null window, so `WM_HOTKEY` lands in the
//! creating thread's message queue. The wait is `GetMessageW`; stop requests
//! post a private sentinel message into the same queue with
//! `PostThreadMessageW`, which is what wakes the blocked loop.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};
use windows::Win32::Foundation::{ERROR_HOTKEY_ALREADY_REGISTERED, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
    MOD_SHIFT, MOD_WIN,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_APP, WM_HOTKEY,
    WM_USER,
};

use super::backend::{HotkeyBackend, Notification, Wakeup};
use super::binding::{BindingId, HotkeyBinding};
use super::error::BackendError;
use super::keys::Modifiers;

/// Sentinel message posted by [`ThreadWakeup`]
const WM_HOTKEY_WAKE: u32 = WM_APP + 0x2A;

/// Backend bound to the thread that created it
pub struct WindowsBackend {
    thread_id: u32,
    // Hotkeys and the message queue belong to the creating thread.
    _not_send: PhantomData<*const ()>,
}

impl WindowsBackend {
    /// Create a backend for the calling thread and make sure its message
    /// queue exists, so wake-ups posted before the first wait are kept.
    pub fn new() -> Self {
        let mut msg = MSG::default();
        // SAFETY: PeekMessageW only writes into the provided MSG.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }
        // SAFETY: GetCurrentThreadId has no preconditions.
        let thread_id = unsafe { GetCurrentThreadId() };
        debug!(thread_id, "win32 hotkey backend created");

        Self {
            thread_id,
            _not_send: PhantomData,
        }
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn to_win32_modifiers(modifiers: Modifiers) -> HOT_KEY_MODIFIERS {
    let mut flags = MOD_NOREPEAT.0;
    if modifiers.control {
        flags |= MOD_CONTROL.0;
    }
    if modifiers.alt {
        flags |= MOD_ALT.0;
    }
    if modifiers.shift {
        flags |= MOD_SHIFT.0;
    }
    if modifiers.win {
        flags |= MOD_WIN.0;
    }
    HOT_KEY_MODIFIERS(flags)
}

fn hotkey_id(id: BindingId) -> Result<i32, BackendError> {
    // Application hotkey ids must stay within 0x0000..=0xBFFF.
    match i32::try_from(id.get()) {
        Ok(raw) if raw <= 0xBFFF => Ok(raw),
        _ => Err(BackendError::Unsupported(format!(
            "binding id {} exceeds the application hotkey range",
            id
        ))),
    }
}

impl HotkeyBackend for WindowsBackend {
    fn register(&mut self, binding: &HotkeyBinding) -> Result<(), BackendError> {
        let id = hotkey_id(binding.id())?;
        // SAFETY: RegisterHotKey is an OS API; a null window targets this thread.
        unsafe { RegisterHotKey(None, id, to_win32_modifiers(binding.modifiers()), binding.key().0) }
            .map_err(|e| {
                if e.code() == ERROR_HOTKEY_ALREADY_REGISTERED.to_hresult() {
                    BackendError::AlreadyRegistered
                } else {
                    BackendError::Host(e.message())
                }
            })
    }

    fn unregister(&mut self, id: BindingId) -> Result<(), BackendError> {
        let raw = hotkey_id(id)?;
        // SAFETY: UnregisterHotKey is an OS API.
        unsafe { UnregisterHotKey(None, raw) }.map_err(|e| BackendError::Host(e.message()))
    }

    fn next_notification(&mut self) -> Notification {
        let mut msg = MSG::default();
        loop {
            // SAFETY: GetMessageW writes into the provided MSG; a null window
            // retrieves thread messages posted to this thread.
            let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            match ret.0 {
                0 => return Notification::Closed,
                -1 => {
                    warn!("GetMessageW failed");
                    return Notification::Closed;
                }
                _ => {}
            }

            match msg.message {
                WM_HOTKEY => match u32::try_from(msg.wParam.0).ok().and_then(BindingId::new) {
                    Some(id) => return Notification::Hotkey(id),
                    None => debug!(wparam = msg.wParam.0, "ignoring system hotkey"),
                },
                WM_HOTKEY_WAKE => return Notification::Wake,
                other => debug!(message = other, "ignoring thread message"),
            }
        }
    }

    fn wakeup(&self) -> Arc<dyn Wakeup> {
        Arc::new(ThreadWakeup {
            thread_id: self.thread_id,
        })
    }
}

struct ThreadWakeup {
    thread_id: u32,
}

impl Wakeup for ThreadWakeup {
    fn wake(&self) -> Result<(), BackendError> {
        // SAFETY: PostThreadMessageW only enqueues a message for the target thread.
        unsafe { PostThreadMessageW(self.thread_id, WM_HOTKEY_WAKE, WPARAM(0), LPARAM(0)) }
            .map_err(|e| BackendError::Wakeup(e.message()))
    }
}
