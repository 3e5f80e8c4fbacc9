use super::messages::CodecError;
use super::transport::TransportError;
use crate::access_control::AccessControlError;
use crate::registry::RegistryError;
use crate::types::{Address, NameId};

/// Coarse classification of a failure, for callers that only need to
/// know who is at fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller lacks a role
    Authorization,
    /// The request conflicts with the current state of a name
    State,
    /// The request or payload itself is invalid
    Data,
    /// The messaging layer refused the message
    Transport,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    AccessControl(#[from] AccessControlError),
    #[error("label {label:?} does not match token {id}")]
    LabelResourceMismatch { label: String, id: NameId },
    #[error("invalid owner: {0}")]
    InvalidOwner(Address),
    #[error("{0} is locked and can not be ejected")]
    LockedNameCannotBeEjected(NameId),
    #[error("name mismatch: expected {expected}, found {found}")]
    NameMismatch { expected: String, found: String },
    #[error("{0} is not a mirror of an ejected name")]
    NameNotMirrored(NameId),
    #[error("batch of {tokens} tokens came with {items} transfer data items")]
    BatchLengthMismatch { tokens: usize, items: usize },
    #[error("ejection {crossing} of {label:?} is stale, already saw crossing {latest}")]
    StaleEjection {
        label: String,
        crossing: u64,
        latest: u64,
    },
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Registry(e) => registry_error_kind(e),
            BridgeError::AccessControl(_) => ErrorKind::Authorization,
            BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::LockedNameCannotBeEjected(_)
            | BridgeError::NameNotMirrored(_)
            | BridgeError::StaleEjection { .. } => ErrorKind::State,
            BridgeError::Codec(_)
            | BridgeError::LabelResourceMismatch { .. }
            | BridgeError::InvalidOwner(_)
            | BridgeError::NameMismatch { .. }
            | BridgeError::BatchLengthMismatch { .. } => ErrorKind::Data,
        }
    }

    /// Whether delivering the same message again later could succeed.
    /// Only a renewal sync that overtook its ejection qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Registry(RegistryError::LabelNotFound(_)))
    }
}

pub fn registry_error_kind(error: &RegistryError) -> ErrorKind {
    match error {
        RegistryError::AccessControl(_) | RegistryError::NotOwner { .. } => {
            ErrorKind::Authorization
        }
        RegistryError::InvalidLabel(_)
        | RegistryError::InvalidOwner(_)
        | RegistryError::ExpiryInPast { .. } => ErrorKind::Data,
        RegistryError::NameAlreadyRegistered { .. }
        | RegistryError::NameNotFound(_)
        | RegistryError::LabelNotFound(_)
        | RegistryError::NameExpired { .. }
        | RegistryError::RenewalNotIncreasing { .. }
        | RegistryError::GenerationsExhausted(_) => ErrorKind::State,
    }
}
