//! Global hotkey listener
//!
//! Owns a set of registered bindings, blocks a dedicated thread on the
//! host's notification queue, and dispatches matching notifications to a
//! callback. Every binding it registers is deregistered exactly once,
//! whichever way the loop ends.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::state::{ListenerState, SharedState};

use super::backend::{HotkeyBackend, Notification, Wakeup};
use super::binding::{BindingId, HotkeyBinding};
use super::error::{DeregistrationWarning, ListenerError, RegistrationCause, RegistrationError};

/// Why the wait loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The designated stop binding fired
    StopBinding(BindingId),
    /// [`StopHandle::stop`] was called
    StopRequested,
    /// The host queue closed underneath the loop
    BackendClosed,
}

/// Requests termination of a running listener from any thread
#[derive(Clone)]
pub struct StopHandle {
    state: SharedState,
    wakeup: Arc<dyn Wakeup>,
}

impl StopHandle {
    /// Ask the listener to stop and wake its blocked wait
    ///
    /// Only acts while the listener is listening. Returns true if this call
    /// issued the request; calls before `run` or after the loop ended are
    /// no-ops.
    pub fn stop(&self) -> bool {
        if !self.state.request_stop() {
            debug!(state = %self.state.get(), "stop ignored, listener not listening");
            return false;
        }

        if let Err(e) = self.wakeup.wake() {
            // The state is already Stopping, so the loop exits on its next
            // notification even if the sentinel never arrives.
            warn!(?e, "failed to post wake sentinel");
        }
        true
    }

    /// Current listener state
    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// Check if the listener is blocked in its wait loop
    pub fn is_listening(&self) -> bool {
        self.state.get() == ListenerState::Listening
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("state", &self.state.get())
            .finish()
    }
}

/// Global hotkey listener over a host backend
pub struct HotkeyListener<B: HotkeyBackend> {
    backend: B,
    state: SharedState,
    /// Registered ids, in registration order
    registered: Vec<BindingId>,
    stop_binding: Option<BindingId>,
}

impl<B: HotkeyBackend> HotkeyListener<B> {
    /// Create a new idle listener with no bindings
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SharedState::new(),
            registered: Vec::new(),
            stop_binding: None,
        }
    }

    /// Designate the binding whose notification ends the wait loop
    pub fn with_stop_binding(mut self, id: BindingId) -> Self {
        self.stop_binding = Some(id);
        self
    }

    /// Get the current state
    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// Ids currently registered with the host
    pub fn registered(&self) -> &[BindingId] {
        &self.registered
    }

    /// A handle for stopping [`HotkeyListener::run`] from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state.clone(),
            wakeup: self.backend.wakeup(),
        }
    }

    /// Register bindings with the host, in order
    ///
    /// Ids are checked for uniqueness before anything is handed to the
    /// host. If the host rejects a binding, every binding this call already
    /// registered is removed again before the error is returned.
    pub fn register<I>(&mut self, bindings: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = HotkeyBinding>,
    {
        let bindings: Vec<HotkeyBinding> = bindings.into_iter().collect();

        let state = self.state.get();
        if state != ListenerState::Idle {
            let failed_id = match bindings.first() {
                Some(binding) => binding.id(),
                None => return Ok(()),
            };
            return Err(RegistrationError {
                failed_id,
                cause: RegistrationCause::InvalidState(state),
            });
        }

        let mut seen: HashSet<BindingId> = self.registered.iter().copied().collect();
        for binding in &bindings {
            if !seen.insert(binding.id()) {
                warn!(%binding, "duplicate binding id");
                return Err(RegistrationError {
                    failed_id: binding.id(),
                    cause: RegistrationCause::DuplicateId,
                });
            }
        }

        self.state.transition_to(ListenerState::Registering);

        let first_new = self.registered.len();
        let mut failure = None;
        for binding in &bindings {
            match self.backend.register(binding) {
                Ok(()) => {
                    info!(%binding, "binding registered");
                    self.registered.push(binding.id());
                }
                Err(e) => {
                    error!(%binding, ?e, "binding registration failed");
                    failure = Some(RegistrationError {
                        failed_id: binding.id(),
                        cause: e.into(),
                    });
                    break;
                }
            }
        }

        if failure.is_some() {
            let partial: Vec<BindingId> = self.registered.drain(first_new..).collect();
            info!(count = partial.len(), "rolling back partial registration");
            self.deregister(partial);
        }

        self.state.transition_to(ListenerState::Idle);
        failure.map_or(Ok(()), Err)
    }

    /// Block the calling thread, dispatching notifications to `on_event`
    ///
    /// The callback runs on this thread and the next notification is not
    /// consumed until it returns. The loop ends when the stop binding fires,
    /// when a [`StopHandle`] requests it, or when the host queue closes.
    /// All bindings are deregistered before returning.
    pub fn run<F>(&mut self, mut on_event: F) -> Result<RunOutcome, ListenerError>
    where
        F: FnMut(BindingId),
    {
        let state = self.state.get();
        if state != ListenerState::Idle {
            return Err(ListenerError::NotIdle(state));
        }

        self.state.transition_to(ListenerState::Listening);
        info!(bindings = self.registered.len(), "listening for hotkeys");

        let outcome = loop {
            // A stop may have been claimed while the callback was running.
            if self.state.get() == ListenerState::Stopping {
                break RunOutcome::StopRequested;
            }

            match self.backend.next_notification() {
                Notification::Hotkey(id) => {
                    if !self.registered.contains(&id) {
                        debug!(%id, "notification for unknown binding");
                        continue;
                    }

                    debug!(%id, "hotkey fired");
                    let result = panic::catch_unwind(AssertUnwindSafe(|| on_event(id)));
                    if result.is_err() {
                        error!(%id, "hotkey callback panicked");
                    }

                    if self.stop_binding == Some(id) {
                        info!(%id, "stop binding fired");
                        break RunOutcome::StopBinding(id);
                    }
                }
                Notification::Wake => {
                    if self.state.get() == ListenerState::Stopping {
                        info!("stop requested");
                        break RunOutcome::StopRequested;
                    }
                    debug!("spurious wake");
                }
                Notification::Closed => {
                    warn!("host notification queue closed");
                    break RunOutcome::BackendClosed;
                }
            }
        };

        self.state.transition_to(ListenerState::Stopping);
        let ids = std::mem::take(&mut self.registered);
        self.deregister(ids);
        self.state.transition_to(ListenerState::Stopped);

        info!(?outcome, "hotkey listener stopped");
        Ok(outcome)
    }

    /// Deregister every id, continuing past failures
    ///
    /// Returns the number of warnings logged.
    fn deregister(&mut self, ids: Vec<BindingId>) -> usize {
        let mut warnings = 0;
        for id in ids {
            match self.backend.unregister(id) {
                Ok(()) => debug!(%id, "binding deregistered"),
                Err(cause) => {
                    let warning = DeregistrationWarning { id, cause };
                    warn!(%warning, "deregistration failed");
                    warnings += 1;
                }
            }
        }
        warnings
    }
}

impl<B: HotkeyBackend> Drop for HotkeyListener<B> {
    fn drop(&mut self) {
        if !self.registered.is_empty() {
            let ids = std::mem::take(&mut self.registered);
            debug!(count = ids.len(), "deregistering bindings on drop");
            self.deregister(ids);
            self.state.transition_to(ListenerState::Stopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::hotkey::error::BackendError;
    use crate::hotkey::keys::{KeyCode, Modifiers};
    use crate::hotkey::virtual_host::{VirtualBackend, VirtualHost};

    fn id(raw: u32) -> BindingId {
        BindingId::new(raw).unwrap()
    }

    fn key(c: char) -> KeyCode {
        KeyCode::from_char(c).unwrap()
    }

    fn binding(raw: u32, modifiers: Modifiers, c: char) -> HotkeyBinding {
        HotkeyBinding::new(id(raw), modifiers, key(c))
    }

    fn listener(host: &VirtualHost) -> HotkeyListener<VirtualBackend> {
        HotkeyListener::new(host.backend())
    }

    fn wait_until_listening(handle: &StopHandle) {
        for _ in 0..500 {
            if handle.is_listening() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("listener never started listening");
    }

    #[test]
    fn test_listener_creation() {
        let host = VirtualHost::new();
        let listener = listener(&host);
        assert_eq!(listener.state(), ListenerState::Idle);
        assert!(listener.registered().is_empty());
    }

    #[test]
    fn test_register_all_bindings_active() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener
            .register([
                binding(1, Modifiers::ALT, 'r'),
                binding(2, Modifiers::ALT, 'q'),
                binding(3, Modifiers::CTRL | Modifiers::ALT, 'b'),
            ])
            .unwrap();

        assert_eq!(host.active_count(), 3);
        assert_eq!(listener.registered(), &[id(1), id(2), id(3)]);
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn test_host_failure_rolls_back() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        host.fail_registration_of(id(3), BackendError::ResourceExhausted);

        let err = listener
            .register([
                binding(1, Modifiers::ALT, 'a'),
                binding(2, Modifiers::ALT, 'b'),
                binding(3, Modifiers::ALT, 'c'),
                binding(4, Modifiers::ALT, 'd'),
            ])
            .unwrap_err();

        assert_eq!(err.failed_id, id(3));
        assert_eq!(err.cause, RegistrationCause::ResourceExhausted);
        assert_eq!(host.active_count(), 0);
        assert_eq!(host.unregister_log(), vec![id(1), id(2)]);
        assert!(listener.registered().is_empty());
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn test_combo_taken_elsewhere_rolls_back() {
        let host = VirtualHost::new();
        let mut other = host.backend();
        other.register(&binding(9, Modifiers::ALT, 'q')).unwrap();

        let mut listener = listener(&host);
        let err = listener
            .register([binding(1, Modifiers::ALT, 'r'), binding(2, Modifiers::ALT, 'q')])
            .unwrap_err();

        assert_eq!(err.failed_id, id(2));
        assert_eq!(err.cause, RegistrationCause::AlreadyRegistered);
        assert_eq!(host.active_ids(), vec![id(9)]);
    }

    #[test]
    fn test_colliding_ids_register_nothing() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);

        let err = listener
            .register([binding(1, Modifiers::ALT, 'r'), binding(1, Modifiers::ALT, 'q')])
            .unwrap_err();

        assert_eq!(err.failed_id, id(1));
        assert_eq!(err.cause, RegistrationCause::DuplicateId);
        assert_eq!(host.active_count(), 0);
        assert!(host.unregister_log().is_empty());
    }

    #[test]
    fn test_id_collision_with_earlier_call() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();

        let err = listener
            .register([binding(1, Modifiers::ALT, 'x')])
            .unwrap_err();
        assert_eq!(err.cause, RegistrationCause::DuplicateId);
        assert_eq!(host.active_count(), 1);
    }

    #[test]
    fn test_callback_then_stop_binding() {
        let host = VirtualHost::new();
        let mut listener = listener(&host).with_stop_binding(id(2));
        listener
            .register([binding(1, Modifiers::ALT, 'r'), binding(2, Modifiers::ALT, 'q')])
            .unwrap();

        assert!(host.press(Modifiers::ALT, key('r')));
        assert!(host.press(Modifiers::ALT, key('r')));
        assert!(host.press(Modifiers::ALT, key('q')));

        let mut fired = Vec::new();
        let outcome = listener.run(|id| fired.push(id)).unwrap();

        assert_eq!(outcome, RunOutcome::StopBinding(id(2)));
        assert_eq!(fired, vec![id(1), id(1), id(2)]);
        assert_eq!(host.active_count(), 0);
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[test]
    fn test_stop_from_another_thread_wakes_run() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();
        let handle = listener.stop_handle();

        let (done_tx, done_rx) = mpsc::channel();
        let loop_thread = thread::spawn(move || {
            let outcome = listener.run(|_| {});
            let _ = done_tx.send(outcome);
        });

        wait_until_listening(&handle);
        assert!(handle.stop());

        let outcome = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("run did not return after stop");
        assert_eq!(outcome, Ok(RunOutcome::StopRequested));
        loop_thread.join().unwrap();

        assert_eq!(handle.state(), ListenerState::Stopped);
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_stop_twice_deregisters_once() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener
            .register([binding(1, Modifiers::ALT, 'r'), binding(2, Modifiers::ALT, 'q')])
            .unwrap();
        let handle = listener.stop_handle();

        let loop_thread = thread::spawn(move || listener.run(|_| {}));
        wait_until_listening(&handle);

        assert!(handle.stop());
        assert!(!handle.stop());
        assert_eq!(loop_thread.join().unwrap(), Ok(RunOutcome::StopRequested));
        assert!(!handle.stop());

        assert_eq!(host.unregister_log(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_stop_before_run_is_noop() {
        let host = VirtualHost::new();
        let mut listener = listener(&host).with_stop_binding(id(1));
        listener.register([binding(1, Modifiers::ALT, 'q')]).unwrap();

        let handle = listener.stop_handle();
        assert!(!handle.stop());
        assert_eq!(listener.state(), ListenerState::Idle);

        // The ignored request leaves no sentinel behind to end the loop early.
        assert!(host.press(Modifiers::ALT, key('q')));
        assert_eq!(listener.run(|_| {}), Ok(RunOutcome::StopBinding(id(1))));
    }

    #[test]
    fn test_run_twice_rejected() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        let handle = listener.stop_handle();
        host.close();

        assert_eq!(listener.run(|_| {}), Ok(RunOutcome::BackendClosed));
        assert_eq!(
            listener.run(|_| {}),
            Err(ListenerError::NotIdle(ListenerState::Stopped))
        );
        assert!(!handle.stop());
    }

    #[test]
    fn test_register_after_stop_rejected() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        host.close();
        listener.run(|_| {}).unwrap();

        let err = listener
            .register([binding(1, Modifiers::ALT, 'r')])
            .unwrap_err();
        assert_eq!(
            err.cause,
            RegistrationCause::InvalidState(ListenerState::Stopped)
        );
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_backend_closed_still_deregisters() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();

        host.close();
        assert_eq!(listener.run(|_| {}), Ok(RunOutcome::BackendClosed));
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_callback_panic_keeps_listening() {
        let host = VirtualHost::new();
        let mut listener = listener(&host).with_stop_binding(id(2));
        listener
            .register([binding(1, Modifiers::ALT, 'r'), binding(2, Modifiers::ALT, 'q')])
            .unwrap();

        host.press(Modifiers::ALT, key('r'));
        host.press(Modifiers::ALT, key('q'));

        let mut calls = 0;
        let outcome = listener
            .run(|id| {
                calls += 1;
                if id.get() == 1 {
                    panic!("callback failure");
                }
            })
            .unwrap();

        assert_eq!(outcome, RunOutcome::StopBinding(id(2)));
        assert_eq!(calls, 2);
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_stop_during_slow_callback() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();
        let handle = listener.stop_handle();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let loop_thread = thread::spawn(move || {
            listener.run(|_| {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
            })
        });

        host.press(Modifiers::ALT, key('r'));
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(handle.stop());
        release_tx.send(()).unwrap();

        assert_eq!(loop_thread.join().unwrap(), Ok(RunOutcome::StopRequested));
        assert_eq!(host.active_count(), 0);
    }

    #[test]
    fn test_deregistration_failure_does_not_block_cleanup() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener
            .register([
                binding(1, Modifiers::ALT, 'a'),
                binding(2, Modifiers::ALT, 'b'),
                binding(3, Modifiers::ALT, 'c'),
            ])
            .unwrap();
        host.fail_unregistration_of(id(2));
        host.revoke(id(3));

        host.close();
        listener.run(|_| {}).unwrap();

        assert_eq!(host.unregister_log(), vec![id(1), id(2), id(3)]);
        assert_eq!(host.active_ids(), vec![id(2)]);
    }

    #[test]
    fn test_unknown_notification_ignored() {
        let host = VirtualHost::new();
        let mut listener = listener(&host);
        listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();

        listener.backend.inject(Notification::Hotkey(id(5)));
        listener.backend.inject(Notification::Wake);
        host.close();

        let mut fired = Vec::new();
        listener.run(|id| fired.push(id)).unwrap();
        assert!(fired.is_empty());
    }

    #[test]
    fn test_drop_without_run_deregisters() {
        let host = VirtualHost::new();
        {
            let mut listener = listener(&host);
            listener
                .register([binding(1, Modifiers::ALT, 'r'), binding(2, Modifiers::ALT, 'q')])
                .unwrap();
            assert_eq!(host.active_count(), 2);
        }
        assert_eq!(host.active_count(), 0);
        assert_eq!(host.unregister_log(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_drop_after_run_does_not_double_deregister() {
        let host = VirtualHost::new();
        {
            let mut listener = listener(&host);
            listener.register([binding(1, Modifiers::ALT, 'r')]).unwrap();
            host.close();
            listener.run(|_| {}).unwrap();
        }
        assert_eq!(host.unregister_log(), vec![id(1)]);
    }
}
