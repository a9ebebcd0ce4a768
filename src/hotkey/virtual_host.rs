//! In-process hotkey host
//!
//! Behaves like a host windowing subsystem without touching the real one:
//! combinations are unique across every backend attached to the host, key
//! presses are simulated with [`VirtualHost::press`], and registration or
//! deregistration failures can be injected. Used by the test suite and by
//! embedders that feed shortcuts from their own input source.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::backend::{HotkeyBackend, Notification, Wakeup};
use super::binding::{BindingId, HotkeyBinding};
use super::error::BackendError;
use super::keys::{KeyCode, KeyCombo, Modifiers};

/// Highest key code the host accepts, matching the virtual-key range
const MAX_KEY_CODE: u32 = 0xFE;

#[derive(Debug, Clone, Copy)]
struct Registration {
    slot: usize,
    binding: HotkeyBinding,
}

#[derive(Default)]
struct HostInner {
    registrations: Vec<Registration>,
    queues: HashMap<usize, Sender<Notification>>,
    next_slot: usize,
    capacity: Option<usize>,
    register_failures: HashMap<BindingId, BackendError>,
    unregister_failures: HashSet<BindingId>,
    unregister_log: Vec<BindingId>,
}

/// Shared handle to an in-process host; clones refer to the same host
#[derive(Clone, Default)]
pub struct VirtualHost {
    inner: Arc<Mutex<HostInner>>,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that refuses registrations beyond `capacity` active bindings
    pub fn with_capacity(capacity: usize) -> Self {
        let host = Self::new();
        host.lock().capacity = Some(capacity);
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a new backend with its own notification queue
    pub fn backend(&self) -> VirtualBackend {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();
        let slot = inner.next_slot;
        inner.next_slot += 1;
        inner.queues.insert(slot, tx.clone());

        VirtualBackend {
            host: self.clone(),
            slot,
            queue_tx: tx,
            queue_rx: rx,
        }
    }

    /// Simulate the user pressing a key combination
    ///
    /// Returns true if a registered binding matched and was notified.
    pub fn press(&self, modifiers: Modifiers, key: KeyCode) -> bool {
        let combo = KeyCombo { modifiers, key };
        let inner = self.lock();
        let Some(reg) = inner
            .registrations
            .iter()
            .find(|reg| reg.binding.combo() == combo)
        else {
            debug!(%combo, "no binding for simulated key press");
            return false;
        };

        match inner.queues.get(&reg.slot) {
            Some(tx) => tx.send(Notification::Hotkey(reg.binding.id())).is_ok(),
            None => false,
        }
    }

    /// Tear down every backend queue, as a host shutting down would
    pub fn close(&self) {
        let mut inner = self.lock();
        for tx in inner.queues.values() {
            let _ = tx.send(Notification::Closed);
        }
        inner.queues.clear();
    }

    /// Number of bindings currently registered across all backends
    pub fn active_count(&self) -> usize {
        self.lock().registrations.len()
    }

    /// Ids currently registered, in registration order
    pub fn active_ids(&self) -> Vec<BindingId> {
        self.lock()
            .registrations
            .iter()
            .map(|reg| reg.binding.id())
            .collect()
    }

    /// Ids passed to unregister, in call order, including failed attempts
    pub fn unregister_log(&self) -> Vec<BindingId> {
        self.lock().unregister_log.clone()
    }

    /// Make the next registration of `id` fail with `err`
    pub fn fail_registration_of(&self, id: BindingId, err: BackendError) {
        self.lock().register_failures.insert(id, err);
    }

    /// Make every deregistration of `id` fail while leaving it registered
    pub fn fail_unregistration_of(&self, id: BindingId) {
        self.lock().unregister_failures.insert(id);
    }

    /// Remove a binding behind its owner's back
    pub fn revoke(&self, id: BindingId) {
        self.lock().registrations.retain(|reg| reg.binding.id() != id);
    }
}

/// Backend attached to a [`VirtualHost`]
pub struct VirtualBackend {
    host: VirtualHost,
    slot: usize,
    queue_tx: Sender<Notification>,
    queue_rx: Receiver<Notification>,
}

impl VirtualBackend {
    /// Push a notification straight into this backend's queue
    pub fn inject(&self, notification: Notification) {
        let _ = self.queue_tx.send(notification);
    }
}

impl HotkeyBackend for VirtualBackend {
    fn register(&mut self, binding: &HotkeyBinding) -> Result<(), BackendError> {
        let mut inner = self.host.lock();

        if let Some(err) = inner.register_failures.remove(&binding.id()) {
            return Err(err);
        }
        if binding.key().0 == 0 || binding.key().0 > MAX_KEY_CODE {
            return Err(BackendError::Unsupported(format!(
                "key code {} is out of range",
                binding.key()
            )));
        }
        if inner
            .registrations
            .iter()
            .any(|reg| reg.slot == self.slot && reg.binding.id() == binding.id())
        {
            return Err(BackendError::Host(format!(
                "id {} already registered on this queue",
                binding.id()
            )));
        }
        if inner
            .registrations
            .iter()
            .any(|reg| reg.binding.combo() == binding.combo())
        {
            return Err(BackendError::AlreadyRegistered);
        }
        if inner
            .capacity
            .is_some_and(|cap| inner.registrations.len() >= cap)
        {
            return Err(BackendError::ResourceExhausted);
        }

        inner.registrations.push(Registration {
            slot: self.slot,
            binding: *binding,
        });
        Ok(())
    }

    fn unregister(&mut self, id: BindingId) -> Result<(), BackendError> {
        let mut inner = self.host.lock();
        inner.unregister_log.push(id);

        if inner.unregister_failures.contains(&id) {
            return Err(BackendError::Host(format!("refused to remove {}", id)));
        }

        let before = inner.registrations.len();
        let slot = self.slot;
        inner
            .registrations
            .retain(|reg| !(reg.slot == slot && reg.binding.id() == id));
        if inner.registrations.len() == before {
            return Err(BackendError::NotRegistered(id));
        }
        Ok(())
    }

    fn next_notification(&mut self) -> Notification {
        // The backend keeps its own sender, so recv only fails if the host
        // dropped the queue entirely.
        self.queue_rx.recv().unwrap_or(Notification::Closed)
    }

    fn wakeup(&self) -> Arc<dyn Wakeup> {
        Arc::new(QueueWakeup {
            tx: self.queue_tx.clone(),
        })
    }
}

struct QueueWakeup {
    tx: Sender<Notification>,
}

impl Wakeup for QueueWakeup {
    fn wake(&self) -> Result<(), BackendError> {
        self.tx
            .send(Notification::Wake)
            .map_err(|e| BackendError::Wakeup(e.to_string()))
    }
}
