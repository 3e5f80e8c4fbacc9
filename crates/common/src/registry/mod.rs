//! # Registry
//!
//! A permissioned registry of single-label names on one ledger.
//!
//! Each registration of a label gets a fresh [`NameId`] (the label hash plus
//! a generation counter), and that id is both the name's token id and the
//! resource its roles are granted at. Burning and re-registering a label
//! therefore never hands the previous holders' roles to the new owner.
//!
//! The registry keeps ownership, generations and roles in memory and writes
//! subregistry, resolver and expiry into its own namespace of the shared
//! [`Datastore`](crate::datastore::Datastore). Availability is always
//! computed from the stored expiry, never cached.

mod names;
pub mod registrar;
mod transfer_data;

use crate::access_control::AccessControlError;
use crate::types::{Address, LabelId, NameId, Timestamp};

pub use names::{NameRecord, Registry};
pub use registrar::{FlatRentOracle, Price, Registrar, RegistrarError, RentOracle, RentRequest};
pub use transfer_data::TransferData;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    AccessControl(#[from] AccessControlError),
    #[error("invalid label: {0:?}")]
    InvalidLabel(String),
    #[error("invalid owner: {0}")]
    InvalidOwner(Address),
    #[error("name already registered: {label:?} ({id})")]
    NameAlreadyRegistered { label: String, id: NameId },
    #[error("name not found: {0}")]
    NameNotFound(NameId),
    #[error("no registration for label {0}")]
    LabelNotFound(LabelId),
    #[error("name {id} expired at {expiry}")]
    NameExpired { id: NameId, expiry: Timestamp },
    #[error("expiry {expiry} is not after the current time {now}")]
    ExpiryInPast { expiry: Timestamp, now: Timestamp },
    #[error("renewal of {id} must increase expiry: current {current}, requested {requested}")]
    RenewalNotIncreasing {
        id: NameId,
        current: Timestamp,
        requested: Timestamp,
    },
    #[error("{account} does not own {id}")]
    NotOwner { id: NameId, account: Address },
    #[error("generations exhausted for label {0}")]
    GenerationsExhausted(LabelId),
}
