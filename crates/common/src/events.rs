use serde::{Deserialize, Serialize};

use crate::access_control::RoleBitmap;
use crate::bridge::MessageType;
use crate::types::{Address, LabelId, NameId, Resource, Timestamp};

/// Everything a ledger reports about its own state changes.
///
/// Events are appended inside the transaction that caused them, so a
/// reverted transaction leaves no events behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A name's token moved. Mints come from and burns go to the zero
    ///  address.
    Transfer {
        operator: Address,
        from: Address,
        to: Address,
        id: NameId,
    },
    NameRegistered {
        id: NameId,
        label: String,
        owner: Address,
        expiry: Timestamp,
    },
    ExpiryUpdated {
        id: NameId,
        expiry: Timestamp,
    },
    SubregistryUpdated {
        id: NameId,
        subregistry: Option<Address>,
    },
    ResolverUpdated {
        id: NameId,
        resolver: Option<Address>,
    },
    /// A name lost its owner. `kept_entry` is true for the soft burn used
    ///  by ejection.
    NameBurned {
        id: NameId,
        kept_entry: bool,
    },
    RolesGranted {
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    },
    RolesRevoked {
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    },
    /// A bridge message was queued for the counterpart ledger
    MessageSent {
        sequence: u64,
        kind: MessageType,
    },
    NameEjected {
        id: NameId,
        label: String,
        owner: Address,
        expiry: Timestamp,
    },
    NameInjected {
        id: NameId,
        label: String,
        owner: Address,
        expiry: Timestamp,
    },
    RenewalSynced {
        id: NameId,
        expiry: Timestamp,
    },
    InvalidOwnerUpdated {
        owner: Address,
        invalid: bool,
    },
}

impl Event {
    /// The label this event concerns, if any
    pub fn label_id(&self) -> Option<LabelId> {
        match self {
            Event::Transfer { id, .. }
            | Event::NameRegistered { id, .. }
            | Event::ExpiryUpdated { id, .. }
            | Event::SubregistryUpdated { id, .. }
            | Event::ResolverUpdated { id, .. }
            | Event::NameBurned { id, .. }
            | Event::NameEjected { id, .. }
            | Event::NameInjected { id, .. }
            | Event::RenewalSynced { id, .. } => Some(id.label),
            Event::RolesGranted { resource, .. } | Event::RolesRevoked { resource, .. } => {
                match resource {
                    Resource::Name(id) => Some(id.label),
                    Resource::Root => None,
                }
            }
            Event::MessageSent { .. } | Event::InvalidOwnerUpdated { .. } => None,
        }
    }
}
