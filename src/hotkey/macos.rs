//! macOS hotkey backend using CGEventTap
//!
//! macOS has no per-id global shortcut registry, so the backend keeps one:
//! a listen-only event tap sees every key-down, and those matching a
//! registered combination are queued as notifications. The tap lives on the
//! thread that registers bindings and is driven by that thread's CFRunLoop.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use super::backend::{HotkeyBackend, Notification, Wakeup};
use super::binding::{BindingId, HotkeyBinding};
use super::error::BackendError;
use super::keys::{KeyCode, Modifiers};

/// How long one run-loop slice lasts before the queue is checked again
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

type ComboTable = Arc<Mutex<HashMap<(Modifiers, u16), BindingId>>>;

/// Event-tap backed hotkey host for macOS
pub struct MacosBackend {
    combos: ComboTable,
    queue_tx: Sender<Notification>,
    queue_rx: Receiver<Notification>,
    tap: Option<(CGEventTap<'static>, CFRunLoopSource)>,
}

impl MacosBackend {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::channel();
        Self {
            combos: Arc::new(Mutex::new(HashMap::new())),
            queue_tx,
            queue_rx,
            tap: None,
        }
    }

    fn ensure_tap(&mut self) -> Result<(), BackendError> {
        if self.tap.is_some() {
            return Ok(());
        }

        let combos = Arc::clone(&self.combos);
        let tx = self.queue_tx.clone();
        // Must stay fast; it runs inside the event tap.
        let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown => {
                    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                    let modifiers = modifiers_from_flags(event.get_flags());
                    let matched = combos
                        .lock()
                        .ok()
                        .and_then(|table| table.get(&(modifiers, keycode)).copied());
                    if let Some(id) = matched {
                        let _ = tx.send(Notification::Hotkey(id));
                    }
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    warn!("event tap disabled by the system");
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| {
            error!("failed to create event tap - is Accessibility permission granted?");
            BackendError::Host("failed to create event tap".to_string())
        })?;

        let source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| BackendError::Host("failed to create run loop source".to_string()))?;

        unsafe {
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
        }
        tap.enable();
        info!("event tap created and enabled");

        self.tap = Some((tap, source));
        Ok(())
    }
}

impl Default for MacosBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        control: flags.contains(CGEventFlags::CGEventFlagControl),
        alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        win: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

/// Translate a virtual-key code to the ANSI keyboard's macOS key code
fn mac_keycode(key: KeyCode) -> Option<u16> {
    const LETTERS: [u16; 26] = [
        0x00, 0x0B, 0x08, 0x02, 0x0E, 0x03, 0x05, 0x04, 0x22, 0x26, 0x28, 0x25, 0x2E, // A-M
        0x2D, 0x1F, 0x23, 0x0C, 0x0F, 0x01, 0x11, 0x20, 0x09, 0x0D, 0x07, 0x10, 0x06, // N-Z
    ];
    const DIGITS: [u16; 10] = [0x1D, 0x12, 0x13, 0x14, 0x15, 0x17, 0x16, 0x1A, 0x1C, 0x19];
    const FUNCTION: [u16; 20] = [
        0x7A, 0x78, 0x63, 0x76, 0x60, 0x61, 0x62, 0x64, 0x65, 0x6D, 0x67, 0x6F, // F1-F12
        0x69, 0x6B, 0x71, 0x6A, 0x40, 0x4F, 0x50, 0x5A, // F13-F20
    ];

    if let Some(c) = key.as_char() {
        return if c.is_ascii_digit() {
            Some(DIGITS[(c as u8 - b'0') as usize])
        } else {
            Some(LETTERS[(c as u8 - b'A') as usize])
        };
    }
    if key.0 >= KeyCode::F1.0 && key.0 < KeyCode::F1.0 + FUNCTION.len() as u32 {
        return Some(FUNCTION[(key.0 - KeyCode::F1.0) as usize]);
    }

    let code = match key {
        KeyCode::BACKSPACE => 0x33,
        KeyCode::TAB => 0x30,
        KeyCode::ENTER => 0x24,
        KeyCode::ESCAPE => 0x35,
        KeyCode::SPACE => 0x31,
        KeyCode::PAGE_UP => 0x74,
        KeyCode::PAGE_DOWN => 0x79,
        KeyCode::END => 0x77,
        KeyCode::HOME => 0x73,
        KeyCode::LEFT => 0x7B,
        KeyCode::UP => 0x7E,
        KeyCode::RIGHT => 0x7C,
        KeyCode::DOWN => 0x7D,
        KeyCode::DELETE => 0x75,
        KeyCode::BACKQUOTE => 0x32,
        _ => return None,
    };
    Some(code)
}

impl HotkeyBackend for MacosBackend {
    fn register(&mut self, binding: &HotkeyBinding) -> Result<(), BackendError> {
        let keycode = mac_keycode(binding.key()).ok_or_else(|| {
            BackendError::Unsupported(format!("no macOS key code for {}", binding.key()))
        })?;

        self.ensure_tap()?;

        let mut table = self
            .combos
            .lock()
            .map_err(|e| BackendError::Host(format!("combo table poisoned: {}", e)))?;
        if table.values().any(|id| *id == binding.id()) {
            return Err(BackendError::Host(format!("id {} already registered", binding.id())));
        }
        let slot = (binding.modifiers(), keycode);
        if table.contains_key(&slot) {
            return Err(BackendError::AlreadyRegistered);
        }
        table.insert(slot, binding.id());
        debug!(combo = %binding.combo(), keycode, "combo added to event tap table");
        Ok(())
    }

    fn unregister(&mut self, id: BindingId) -> Result<(), BackendError> {
        let mut table = self
            .combos
            .lock()
            .map_err(|e| BackendError::Host(format!("combo table poisoned: {}", e)))?;
        let before = table.len();
        table.retain(|_, bound| *bound != id);
        if table.len() == before {
            return Err(BackendError::NotRegistered(id));
        }
        Ok(())
    }

    fn next_notification(&mut self) -> Notification {
        loop {
            match self.queue_rx.try_recv() {
                Ok(notification) => return notification,
                Err(TryRecvError::Disconnected) => return Notification::Closed,
                Err(TryRecvError::Empty) => {}
            }

            // Tap callbacks only fire while the run loop runs on this thread.
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
            }
        }
    }

    fn wakeup(&self) -> Arc<dyn Wakeup> {
        Arc::new(ChannelWakeup {
            tx: self.queue_tx.clone(),
        })
    }
}

struct ChannelWakeup {
    tx: Sender<Notification>,
}

impl Wakeup for ChannelWakeup {
    fn wake(&self) -> Result<(), BackendError> {
        self.tx
            .send(Notification::Wake)
            .map_err(|e| BackendError::Wakeup(e.to_string()))
    }
}
