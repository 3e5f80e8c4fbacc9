//! # Bridge
//!
//! Moves live names between two ledgers.
//!
//! Each ledger runs a [`BridgeController`]. Transferring a name's token to
//! the controller ejects it: the local registration is soft-burned (owner
//! and roles dropped, entry kept) and an [`EjectionMessage`] is queued on
//! the [`BridgeTransport`]. The counterpart controller injects it as a new
//! registration with its own local resource. Renewals of a bridged name on
//! the ledger that owns it are mirrored back with a
//! [`RenewalSyncMessage`], which only ever moves the mirror's expiry
//! forward.
//!
//! Ownership never lives on both ledgers at once: the source stops owning
//! the name in the same transaction that queues the message.

mod controller;
mod error;
pub mod messages;
mod transport;

pub use controller::{BridgeController, IngressOutcome};
pub use error::{registry_error_kind, BridgeError, ErrorKind};
pub use messages::{BridgeMessage, CodecError, EjectionMessage, MessageType, RenewalSyncMessage};
pub use transport::{BridgeTransport, OutboundMessage, Outbox, TransportError};
