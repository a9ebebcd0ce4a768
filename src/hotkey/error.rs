//! Errors reported by the hotkey listener and its backends

use crate::state::ListenerState;

use super::binding::BindingId;

/// Errors a host backend reports for a single operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("key combination is already registered")]
    AlreadyRegistered,

    #[error("unsupported key combination: {0}")]
    Unsupported(String),

    #[error("host ran out of hotkey resources")]
    ResourceExhausted,

    #[error("binding {0} is not registered")]
    NotRegistered(BindingId),

    #[error("failed to wake the listener thread: {0}")]
    Wakeup(String),

    #[error("host error: {0}")]
    Host(String),
}

/// Why a binding could not be registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationCause {
    #[error("id is already in use on this listener")]
    DuplicateId,

    #[error("key combination is already registered")]
    AlreadyRegistered,

    #[error("unsupported key combination: {0}")]
    Unsupported(String),

    #[error("host ran out of hotkey resources")]
    ResourceExhausted,

    #[error("listener is {0}, bindings can only be registered while idle")]
    InvalidState(ListenerState),

    #[error("host error: {0}")]
    Host(String),
}

impl From<BackendError> for RegistrationCause {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AlreadyRegistered => Self::AlreadyRegistered,
            BackendError::Unsupported(msg) => Self::Unsupported(msg),
            BackendError::ResourceExhausted => Self::ResourceExhausted,
            other => Self::Host(other.to_string()),
        }
    }
}

/// A binding could not be created; nothing from the failed call stays registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to register binding {failed_id}: {cause}")]
pub struct RegistrationError {
    pub failed_id: BindingId,
    #[source]
    pub cause: RegistrationCause,
}

/// Errors from running the wait loop
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    #[error("listener is {0}, it can only run once from idle")]
    NotIdle(ListenerState),
}

/// Non-fatal failure while deregistering a binding during cleanup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to deregister binding {id}: {cause}")]
pub struct DeregistrationWarning {
    pub id: BindingId,
    #[source]
    pub cause: BackendError,
}
