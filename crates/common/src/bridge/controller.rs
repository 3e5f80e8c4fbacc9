use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::BridgeError;
use super::messages::{
    decode_ejection, decode_renewal, decode_transfer_batch, decode_transfer_data, encode_ejection,
    encode_renewal, peek_type, EjectionMessage, MessageType, RenewalSyncMessage,
};
use super::transport::{BridgeTransport, TransportError};
use crate::access_control::{AccessControl, RoleBitmap, Roles};
use crate::context::TxContext;
use crate::datastore::Datastore;
use crate::events::Event;
use crate::registry::{Registry, RegistryError, TransferData};
use crate::types::{Address, LabelId, NameId, Resource, Timestamp};

/// What an inbound message did to the receiving ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngressOutcome {
    Injected(NameId),
    RenewalSynced { id: NameId, expiry: Timestamp },
}

/// The bridge endpoint on one ledger.
///
/// Egress starts when a name's token is transferred to the controller's
/// address: the name is soft-burned locally and an ejection is queued on the
/// transport. Ingress runs when the transport identity (holder of EJECTOR)
/// delivers a payload: ejections recreate the name under a fresh local
/// resource, renewal syncs move the expiry of a local mirror forward.
///
/// Every ejection carries the label's crossing count. Both controllers
/// remember the latest crossing they sent or accepted per label, so a
/// redelivered ejection from an earlier crossing can never bring a name
/// back to life on a ledger it has since left.
#[derive(Debug, Clone)]
pub struct BridgeController {
    address: Address,
    access: AccessControl,
    /// Owners names may never be ejected to
    denied_owners: HashSet<Address>,
    /// Latest crossing sent or accepted, per label that crossed the bridge
    crossings: HashMap<LabelId, u64>,
}

impl BridgeController {
    /// Create a controller administered by `admin`, accepting messages
    /// delivered by `transport`
    pub fn new(address: Address, admin: Address, transport: Address) -> Self {
        let mut access = AccessControl::new(admin);
        access.grant_unchecked(Resource::Root, RoleBitmap::owner(Roles::EJECTOR), transport);
        Self {
            address,
            access,
            denied_owners: HashSet::new(),
            crossings: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn is_bridged(&self, label: LabelId) -> bool {
        self.crossings.contains_key(&label)
    }

    /// Latest crossing of `label` this controller sent or accepted, 0 if
    /// the label never crossed
    pub fn crossing(&self, label: LabelId) -> u64 {
        self.crossings.get(&label).copied().unwrap_or(0)
    }

    pub fn is_invalid_owner(&self, owner: Address) -> bool {
        owner.is_zero() || self.denied_owners.contains(&owner)
    }

    pub fn grant_roles<D>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, BridgeError> {
        let granted = self
            .access
            .grant_roles(ctx.caller, Resource::Root, roles, account)?;
        if !granted.is_empty() {
            ctx.emit(Event::RolesGranted {
                resource: Resource::Root,
                roles: granted,
                account,
            });
        }
        Ok(granted)
    }

    pub fn revoke_roles<D>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, BridgeError> {
        let revoked = self
            .access
            .revoke_roles(ctx.caller, Resource::Root, roles, account)?;
        if !revoked.is_empty() {
            ctx.emit(Event::RolesRevoked {
                resource: Resource::Root,
                roles: revoked,
                account,
            });
        }
        Ok(revoked)
    }

    /// Add or remove `owner` from the deny-list. Requires the EJECTOR
    /// admin bit at the controller's root.
    pub fn set_invalid_owner<D>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        owner: Address,
        invalid: bool,
    ) -> Result<(), BridgeError> {
        self.access
            .check_root_roles(RoleBitmap::admin(Roles::EJECTOR), ctx.caller)?;
        if owner.is_zero() {
            return Err(BridgeError::InvalidOwner(owner));
        }
        let changed = if invalid {
            self.denied_owners.insert(owner)
        } else {
            self.denied_owners.remove(&owner)
        };
        if changed {
            tracing::info!("owner {} invalid: {}", owner, invalid);
            ctx.emit(Event::InvalidOwnerUpdated { owner, invalid });
        }
        Ok(())
    }

    /* Egress */

    /// Token-receive hook for a single token.
    ///
    /// Runs after the token (and its roles) moved to the controller, inside
    /// the same transaction; any error reverts the transfer too.
    pub fn on_token_received<D: Datastore, T: BridgeTransport>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        transport: &mut T,
        id: NameId,
        data: &[u8],
    ) -> Result<(), BridgeError> {
        let data = decode_transfer_data(data)?;
        self.eject(registry, ctx, transport, id, data)
    }

    /// Token-receive hook for a batch of tokens, one transfer data item
    /// per token
    pub fn on_batch_received<D: Datastore, T: BridgeTransport>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        transport: &mut T,
        ids: &[NameId],
        data: &[u8],
    ) -> Result<(), BridgeError> {
        let batch = decode_transfer_batch(data)?;
        if batch.len() != ids.len() {
            return Err(BridgeError::BatchLengthMismatch {
                tokens: ids.len(),
                items: batch.len(),
            });
        }
        for (id, data) in ids.iter().zip(batch) {
            self.eject(registry, ctx, transport, *id, data)?;
        }
        Ok(())
    }

    fn eject<D: Datastore, T: BridgeTransport>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        transport: &mut T,
        id: NameId,
        mut data: TransferData,
    ) -> Result<(), BridgeError> {
        if data.label_id() != id.label {
            return Err(BridgeError::LabelResourceMismatch {
                label: data.label,
                id,
            });
        }
        if self.is_invalid_owner(data.owner) {
            return Err(BridgeError::InvalidOwner(data.owner));
        }
        if registry
            .access()
            .role_count(id.resource(), Roles::SET_SUBREGISTRY)
            == 0
        {
            return Err(BridgeError::LockedNameCannotBeEjected(id));
        }
        let entry = registry
            .entry(ctx.store, id)
            .ok_or(RegistryError::NameNotFound(id))?;
        data.expiry = entry.expiry;

        registry.burn(&mut ctx.as_caller(self.address), id, true)?;

        let crossing = self.crossing(id.label).saturating_add(1);
        let message = EjectionMessage::new(registry.name_path(&data.label), data, crossing);
        let sequence = transport.send_message(encode_ejection(&message)?)?;
        self.crossings.insert(id.label, crossing);

        tracing::info!(
            "ejected {} ({}) to {} until {}, crossing {}",
            message.dotted(),
            id,
            message.transfer.owner,
            message.transfer.expiry,
            crossing
        );
        ctx.emit(Event::NameEjected {
            id,
            label: message.transfer.label.clone(),
            owner: message.transfer.owner,
            expiry: message.transfer.expiry,
        });
        ctx.emit(Event::MessageSent {
            sequence,
            kind: MessageType::Ejection,
        });
        Ok(())
    }

    /// Tell the other ledger about a renewal of a name that crossed the
    /// bridge and is owned here. Does nothing for any other name.
    pub fn after_renewal<D: Datastore, T: BridgeTransport>(
        &mut self,
        registry: &Registry,
        ctx: &mut TxContext<'_, D>,
        transport: &mut T,
        id: NameId,
        expiry: Timestamp,
    ) -> Result<(), BridgeError> {
        if !self.is_bridged(id.label) || registry.owner_of(ctx.store, ctx.now, id).is_none() {
            return Ok(());
        }
        let payload = encode_renewal(&RenewalSyncMessage::new(id.label, expiry))?;
        let sequence = transport.send_message(payload)?;
        tracing::debug!("queued renewal sync for {} until {}", id, expiry);
        ctx.emit(Event::MessageSent {
            sequence,
            kind: MessageType::RenewalSync,
        });
        Ok(())
    }

    /* Ingress */

    /// Handle a payload delivered by the transport. `ctx.caller` is the
    /// delivering account and must hold EJECTOR at the controller's root.
    pub fn on_message<D: Datastore>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        payload: &[u8],
    ) -> Result<IngressOutcome, BridgeError> {
        let required = RoleBitmap::owner(Roles::EJECTOR);
        if !self.access.has_root_roles(required, ctx.caller) {
            tracing::warn!("rejected bridge message from {}", ctx.caller);
            return Err(TransportError::UnauthorizedCaller {
                caller: ctx.caller,
                missing: required.difference(self.access.roles(Resource::Root, ctx.caller)),
            }
            .into());
        }

        match peek_type(payload)? {
            MessageType::Ejection => self.inject(registry, ctx, payload),
            MessageType::RenewalSync => self.sync_renewal(registry, ctx, payload),
        }
    }

    fn inject<D: Datastore>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        payload: &[u8],
    ) -> Result<IngressOutcome, BridgeError> {
        let message = decode_ejection(payload)?;
        let data = &message.transfer;

        let expected = registry.name_path(&data.label);
        if message.name != expected {
            return Err(BridgeError::NameMismatch {
                expected: expected.join("."),
                found: message.dotted(),
            });
        }
        if data.owner == self.address || data.owner.is_zero() {
            return Err(BridgeError::InvalidOwner(data.owner));
        }

        let label = data.label_id();
        let latest = self.crossing(label);
        if message.crossing <= latest {
            // a replay onto a live registration keeps reporting the conflict
            let live = registry
                .current_id(label)
                .filter(|current| registry.owner_of(ctx.store, ctx.now, *current).is_some());
            if let Some(id) = live {
                return Err(RegistryError::NameAlreadyRegistered {
                    label: data.label.clone(),
                    id,
                }
                .into());
            }
            tracing::warn!(
                "rejected stale ejection {} of {}, latest {}",
                message.crossing,
                message.dotted(),
                latest
            );
            return Err(BridgeError::StaleEjection {
                label: data.label.clone(),
                crossing: message.crossing,
                latest,
            });
        }

        let mut ctx = ctx.as_caller(self.address);
        let mirrored = registry
            .current_id(label)
            .is_some_and(|current| registry.is_mirror(ctx.store, current));
        let id = if mirrored {
            registry.reclaim(&mut ctx, data)?
        } else {
            registry.register(&mut ctx, data)?
        };
        self.crossings.insert(label, message.crossing);

        let expiry = registry
            .entry(ctx.store, id)
            .map(|entry| entry.expiry)
            .unwrap_or(data.expiry);
        tracing::info!("injected {} as {} for {}", message.dotted(), id, data.owner);
        ctx.emit(Event::NameInjected {
            id,
            label: data.label.clone(),
            owner: data.owner,
            expiry,
        });
        Ok(IngressOutcome::Injected(id))
    }

    fn sync_renewal<D: Datastore>(
        &mut self,
        registry: &mut Registry,
        ctx: &mut TxContext<'_, D>,
        payload: &[u8],
    ) -> Result<IngressOutcome, BridgeError> {
        let message = decode_renewal(payload)?;
        let id = registry
            .current_id(message.label)
            .ok_or(RegistryError::LabelNotFound(message.label))?;
        if !registry.is_mirror(ctx.store, id) {
            return Err(BridgeError::NameNotMirrored(id));
        }

        registry.renew(&mut ctx.as_caller(self.address), id, message.expiry)?;
        tracing::info!("synced renewal of {} until {}", id, message.expiry);
        ctx.emit(Event::RenewalSynced {
            id,
            expiry: message.expiry,
        });
        Ok(IngressOutcome::RenewalSynced {
            id,
            expiry: message.expiry,
        })
    }
}
