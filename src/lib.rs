//! shortcut-daemon: global keyboard shortcut listener
//!
//! Registers global key combinations with the host, blocks a dedicated
//! thread waiting for them, and hands each press to a callback:
//! - Bindings are registered all-or-nothing, in order
//! - The wait loop ends on a stop binding or a cross-thread stop request
//! - Every registered binding is released on every exit path
//!
//! ```no_run
//! use shortcut_daemon::hotkey::{BindingId, HotkeyBinding, HotkeyListener, KeyCode, Modifiers, VirtualHost};
//!
//! let host = VirtualHost::new();
//! let quit = BindingId::new(2).unwrap();
//! let mut listener = HotkeyListener::new(host.backend()).with_stop_binding(quit);
//! listener.register([
//!     HotkeyBinding::new(BindingId::new(1).unwrap(), Modifiers::ALT, KeyCode::from_char('r').unwrap()),
//!     HotkeyBinding::new(quit, Modifiers::ALT, KeyCode::from_char('q').unwrap()),
//! ])?;
//! listener.run(|id| println!("hotkey {id} pressed"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod events;
pub mod hotkey;
pub mod lifecycle;
pub mod state;
