/**
 * Resource-scoped roles with owner and admin bits.
 *  Gates every mutation in the registry and the
 *  bridge controller.
 */
pub mod access_control;
/**
 * Moving live names between two ledgers:
 *  wire format, transport and the controller
 *  state machine.
 */
pub mod bridge;
pub mod clock;
pub mod context;
/**
 * Entry storage shared by every registry on a
 *  ledger, namespaced by the writing registry.
 */
pub mod datastore;
pub mod events;
/**
 * A ledger ties a datastore, a registry and a
 *  bridge controller together and runs atomic
 *  transactions over them.
 */
pub mod ledger;
/**
 * Name lifecycle: register, renew, burn and
 *  re-register, with fresh resources per
 *  registration.
 */
pub mod registry;
pub mod testkit;
pub mod types;

pub mod prelude {
    pub use crate::access_control::{AccessControl, AccessControlError, RoleBitmap, Roles};
    pub use crate::bridge::{
        BridgeController, BridgeError, BridgeMessage, BridgeTransport, ErrorKind, IngressOutcome,
        MessageType,
    };
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::datastore::{Datastore, Entry, MemoryDatastore};
    pub use crate::events::Event;
    pub use crate::ledger::{ControllerConfig, Ledger, LedgerConfig};
    pub use crate::registry::{Registry, RegistryError, TransferData};
    pub use crate::types::{Address, LabelId, NameId, Resource, Timestamp};
}
