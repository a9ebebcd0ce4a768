//! Listener lifecycle state
//!
//! The listener moves through five states:
//! - Idle: no wait loop, bindings may be registered
//! - Registering: bindings are being handed to the host
//! - Listening: the wait loop is blocked on host notifications
//! - Stopping: the loop is exiting and deregistering bindings
//! - Stopped: terminal, nothing is registered

mod machine;

pub use machine::{ListenerState, SharedState};
