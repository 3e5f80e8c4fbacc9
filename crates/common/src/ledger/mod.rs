//! # Ledger
//!
//! One ledger: a datastore, the registry writing into it, the bridge
//! controller and its outbound queue, and the event log.
//!
//! Every mutating call is a transaction. Transactions run one at a time
//! under the ledger lock, and a transaction that fails leaves no trace:
//! the state (events and queued messages included) is restored from a
//! snapshot taken before it started.

mod config;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::access_control::{RoleBitmap, Roles};
use crate::bridge::{BridgeController, BridgeError, IngressOutcome, OutboundMessage, Outbox};
use crate::clock::Clock;
use crate::context::TxContext;
use crate::datastore::{Datastore, Entry, MemoryDatastore};
use crate::events::Event;
use crate::registry::{
    NameRecord, Price, Registrar, RegistrarError, Registry, RegistryError, RentOracle, RentRequest,
    TransferData,
};
use crate::types::{Address, LabelId, NameId, RegistryId, Resource, Timestamp};

pub use config::{ControllerConfig, LedgerConfig};

#[derive(Debug, Clone)]
struct LedgerState<D> {
    store: D,
    registry: Registry,
    controller: BridgeController,
    outbox: Outbox,
    events: Vec<Event>,
}

/// Mutable borrows of every component for the duration of a transaction
struct Transaction<'a, D> {
    registry: &'a mut Registry,
    controller: &'a mut BridgeController,
    outbox: &'a mut Outbox,
    ctx: TxContext<'a, D>,
}

#[derive(Debug, Clone)]
pub struct Ledger<D: Datastore = MemoryDatastore> {
    name: Arc<str>,
    state: Arc<Mutex<LedgerState<D>>>,
    clock: Arc<dyn Clock>,
}

impl Ledger<MemoryDatastore> {
    pub fn in_memory(config: &LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, BridgeError> {
        Self::new(config, MemoryDatastore::new(), clock)
    }
}

impl<D: Datastore> Ledger<D> {
    /// Bootstrap a ledger.
    ///
    /// The admin gets every role at the root of both the registry and the
    /// controller; the controller gets REGISTRAR and RENEW at the registry
    /// root so it can inject names and sync renewals.
    pub fn new(
        config: &LedgerConfig,
        store: D,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BridgeError> {
        let mut registry = Registry::new(config.registry, config.parent.clone(), config.admin);
        registry.access_mut().grant_unchecked(
            Resource::Root,
            RoleBitmap::owner(Roles::REGISTRAR | Roles::RENEW),
            config.controller.address,
        );
        let controller = BridgeController::new(
            config.controller.address,
            config.admin,
            config.controller.transport,
        );

        let ledger = Self {
            name: Arc::from(config.name.as_str()),
            state: Arc::new(Mutex::new(LedgerState {
                store,
                registry,
                controller,
                outbox: Outbox::new(config.outbox_capacity),
                events: Vec::new(),
            })),
            clock,
        };
        for owner in &config.controller.denied_owners {
            ledger.set_invalid_owner(config.admin, *owner, true)?;
        }

        tracing::info!(
            "ledger {} up: registry {} controller {}",
            config.name,
            config.registry,
            config.controller.address
        );
        Ok(ledger)
    }

    fn transact<T, E: std::fmt::Display>(
        &self,
        caller: Address,
        f: impl FnOnce(Transaction<'_, D>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.lock();
        let snapshot = state.clone();
        let now = self.clock.now();

        let LedgerState {
            store,
            registry,
            controller,
            outbox,
            events,
        } = &mut *state;
        let result = f(Transaction {
            registry,
            controller,
            outbox,
            ctx: TxContext::new(caller, now, store, events),
        });

        if let Err(e) = &result {
            tracing::debug!("{}: transaction from {} reverted: {}", self.name, caller, e);
            *state = snapshot;
        }
        result
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState<D>, Timestamp) -> T) -> T {
        let state = self.state.lock();
        f(&state, self.clock.now())
    }

    /* Transactions */

    pub fn register(&self, caller: Address, data: TransferData) -> Result<NameId, RegistryError> {
        self.transact(caller, |mut tx| tx.registry.register(&mut tx.ctx, &data))
    }

    /// Register through a paid registrar, on behalf of its account
    pub fn rent<O: RentOracle>(
        &self,
        registrar: &Registrar<O>,
        request: &RentRequest,
    ) -> Result<(NameId, Price), RegistrarError> {
        self.transact(registrar.account(), |mut tx| {
            registrar.register(tx.registry, &mut tx.ctx, request)
        })
    }

    /// Renew a name. If the name crossed the bridge and is owned here, the
    /// new expiry is queued for the other ledger in the same transaction.
    pub fn renew(&self, caller: Address, id: NameId, expiry: Timestamp) -> Result<(), BridgeError> {
        self.transact(caller, |mut tx| {
            tx.registry.renew(&mut tx.ctx, id, expiry)?;
            tx.controller
                .after_renewal(tx.registry, &mut tx.ctx, tx.outbox, id, expiry)
        })
    }

    /// Burn a name; `keep_entry` leaves its entry behind as a mirror
    pub fn burn(&self, caller: Address, id: NameId, keep_entry: bool) -> Result<(), RegistryError> {
        self.transact(caller, |mut tx| tx.registry.burn(&mut tx.ctx, id, keep_entry))
    }

    pub fn set_subregistry(
        &self,
        caller: Address,
        id: NameId,
        subregistry: Option<Address>,
    ) -> Result<(), RegistryError> {
        self.transact(caller, |mut tx| {
            tx.registry.set_subregistry(&mut tx.ctx, id, subregistry)
        })
    }

    pub fn set_resolver(
        &self,
        caller: Address,
        id: NameId,
        resolver: Option<Address>,
    ) -> Result<(), RegistryError> {
        self.transact(caller, |mut tx| tx.registry.set_resolver(&mut tx.ctx, id, resolver))
    }

    pub fn grant_roles(
        &self,
        caller: Address,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, RegistryError> {
        self.transact(caller, |mut tx| {
            tx.registry.grant_roles(&mut tx.ctx, resource, roles, account)
        })
    }

    pub fn revoke_roles(
        &self,
        caller: Address,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, RegistryError> {
        self.transact(caller, |mut tx| {
            tx.registry.revoke_roles(&mut tx.ctx, resource, roles, account)
        })
    }

    /// Grant roles at the bridge controller's root
    pub fn grant_controller_roles(
        &self,
        caller: Address,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, BridgeError> {
        self.transact(caller, |mut tx| {
            tx.controller.grant_roles(&mut tx.ctx, roles, account)
        })
    }

    pub fn revoke_controller_roles(
        &self,
        caller: Address,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, BridgeError> {
        self.transact(caller, |mut tx| {
            tx.controller.revoke_roles(&mut tx.ctx, roles, account)
        })
    }

    /// Transfer a name's token. Sending it to the controller ejects the
    /// name, with `data` holding the encoded [`TransferData`].
    pub fn safe_transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        id: NameId,
        data: &[u8],
    ) -> Result<(), BridgeError> {
        self.transact(caller, |mut tx| {
            tx.registry.safe_transfer_from(&mut tx.ctx, from, to, id)?;
            if to == tx.controller.address() {
                tx.controller.on_token_received(
                    tx.registry,
                    &mut tx.ctx.as_caller(from),
                    tx.outbox,
                    id,
                    data,
                )?;
            }
            Ok(())
        })
    }

    /// Transfer several tokens at once. Sending them to the controller
    /// ejects all of them, with `data` holding one encoded [`TransferData`]
    /// per token.
    pub fn safe_batch_transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        ids: &[NameId],
        data: &[u8],
    ) -> Result<(), BridgeError> {
        self.transact(caller, |mut tx| {
            for id in ids {
                tx.registry.safe_transfer_from(&mut tx.ctx, from, to, *id)?;
            }
            if to == tx.controller.address() {
                tx.controller.on_batch_received(
                    tx.registry,
                    &mut tx.ctx.as_caller(from),
                    tx.outbox,
                    ids,
                    data,
                )?;
            }
            Ok(())
        })
    }

    /// Deliver a payload from the other ledger. `caller` must hold EJECTOR
    /// at the controller's root.
    pub fn on_message(
        &self,
        caller: Address,
        payload: &[u8],
    ) -> Result<IngressOutcome, BridgeError> {
        let result = self.transact(caller, |mut tx| {
            tx.controller.on_message(tx.registry, &mut tx.ctx, payload)
        });
        if let Err(e) = &result {
            tracing::warn!("{}: rejected inbound message: {}", self.name, e);
        }
        result
    }

    pub fn set_invalid_owner(
        &self,
        caller: Address,
        owner: Address,
        invalid: bool,
    ) -> Result<(), BridgeError> {
        self.transact(caller, |mut tx| {
            tx.controller.set_invalid_owner(&mut tx.ctx, owner, invalid)
        })
    }

    /* Outbound queue */

    /// Take every message queued for the other ledger
    pub fn take_outbound(&self) -> Vec<OutboundMessage> {
        self.state.lock().outbox.drain()
    }

    /// Return messages taken with [`take_outbound`](Self::take_outbound)
    /// that could not be handed on
    pub fn restore_outbound(&self, messages: Vec<OutboundMessage>) {
        if !messages.is_empty() {
            self.state.lock().outbox.restore(messages);
        }
    }

    pub fn outbound_len(&self) -> usize {
        self.state.lock().outbox.len()
    }

    /* Queries */

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn registry_id(&self) -> RegistryId {
        self.read(|state, _| state.registry.id())
    }

    pub fn controller_address(&self) -> Address {
        self.read(|state, _| state.controller.address())
    }

    pub fn parent(&self) -> Vec<String> {
        self.read(|state, _| state.registry.parent().to_vec())
    }

    pub fn is_available(&self, label: &str) -> bool {
        self.read(|state, now| state.registry.is_available(&state.store, now, label))
    }

    pub fn current_id(&self, label: &str) -> Option<NameId> {
        self.read(|state, _| state.registry.current_id(LabelId::of(label)))
    }

    pub fn owner_of(&self, id: NameId) -> Option<Address> {
        self.read(|state, now| state.registry.owner_of(&state.store, now, id))
    }

    pub fn entry(&self, id: NameId) -> Option<Entry> {
        self.read(|state, _| state.registry.entry(&state.store, id))
    }

    /// Read an entry from any registry's namespace on this ledger
    pub fn entry_in(&self, registry: RegistryId, id: NameId) -> Option<Entry> {
        self.read(|state, _| state.store.entry(registry, id))
    }

    pub fn name_record(&self, label: &str) -> Option<NameRecord> {
        self.read(|state, now| state.registry.name_record(&state.store, now, label))
    }

    pub fn roles(&self, id: NameId, account: Address) -> RoleBitmap {
        self.read(|state, _| state.registry.roles(id, account))
    }

    pub fn has_roles(&self, resource: Resource, roles: RoleBitmap, account: Address) -> bool {
        self.read(|state, _| state.registry.access().has_roles(resource, roles, account))
    }

    pub fn controller_roles(&self, account: Address) -> RoleBitmap {
        self.read(|state, _| state.controller.access().roles(Resource::Root, account))
    }

    pub fn is_invalid_owner(&self, owner: Address) -> bool {
        self.read(|state, _| state.controller.is_invalid_owner(owner))
    }

    pub fn is_bridged(&self, label: &str) -> bool {
        self.read(|state, _| state.controller.is_bridged(LabelId::of(label)))
    }

    /// Latest bridge crossing of `label` seen by this ledger's controller
    pub fn crossing(&self, label: &str) -> u64 {
        self.read(|state, _| state.controller.crossing(LabelId::of(label)))
    }

    pub fn events(&self) -> Vec<Event> {
        self.read(|state, _| state.events.clone())
    }

    /// Events that concern `label`, oldest first
    pub fn events_for(&self, label: &str) -> Vec<Event> {
        let label = LabelId::of(label);
        self.read(|state, _| {
            state
                .events
                .iter()
                .filter(|event| event.label_id() == Some(label))
                .cloned()
                .collect()
        })
    }
}
