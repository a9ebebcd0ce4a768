//! Hotkey bindings and their identifiers

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;

use super::keys::{KeyCode, KeyCombo, Modifiers};

/// Identifier of a binding, unique within one listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(NonZeroU32);

impl BindingId {
    /// Create an id; zero is not a valid binding id
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A global shortcut: an id plus the key combination that triggers it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    id: BindingId,
    modifiers: Modifiers,
    key: KeyCode,
}

impl HotkeyBinding {
    pub fn new(id: BindingId, modifiers: Modifiers, key: KeyCode) -> Self {
        Self { id, modifiers, key }
    }

    pub fn from_combo(id: BindingId, combo: KeyCombo) -> Self {
        Self::new(id, combo.modifiers, combo.key)
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }

    pub fn combo(&self) -> KeyCombo {
        KeyCombo {
            modifiers: self.modifiers,
            key: self.key,
        }
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.combo())
    }
}

/// Hands out binding ids that do not collide with reserved ones
///
/// Ids supplied by the caller are reserved first; allocation then walks
/// upward from 1, skipping anything already taken.
#[derive(Debug, Default)]
pub struct BindingAllocator {
    taken: BTreeSet<BindingId>,
    next: u32,
}

impl BindingAllocator {
    pub fn new() -> Self {
        Self {
            taken: BTreeSet::new(),
            next: 1,
        }
    }

    /// Reserve a caller-chosen id; returns false if it is already taken
    pub fn reserve(&mut self, id: BindingId) -> bool {
        self.taken.insert(id)
    }

    /// Allocate the lowest free id at or above the cursor
    pub fn allocate(&mut self) -> Option<BindingId> {
        loop {
            let id = BindingId::new(self.next.max(1))?;
            self.next = id.get().checked_add(1)?;
            if self.taken.insert(id) {
                return Some(id);
            }
        }
    }
}
