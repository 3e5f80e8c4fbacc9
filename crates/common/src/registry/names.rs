use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{RegistryError, TransferData};
use crate::access_control::{AccessControl, RoleBitmap, Roles};
use crate::context::TxContext;
use crate::datastore::{Datastore, Entry};
use crate::events::Event;
use crate::types::{is_valid_label, Address, LabelId, NameId, RegistryId, Resource, Timestamp};

/// Everything known about the current registration of a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub label: String,
    pub id: NameId,
    /// `None` once the name has expired or been burned
    pub owner: Option<Address>,
    /// Roles the owner holds at the name's resource
    pub roles: RoleBitmap,
    pub entry: Entry,
}

impl NameRecord {
    pub fn is_live(&self, now: Timestamp) -> bool {
        !self.entry.is_expired(now)
    }
}

/// A permissioned registry for the labels below one parent name
#[derive(Debug, Clone)]
pub struct Registry {
    id: RegistryId,
    /// Labels of the parent name, closest first, e.g. `["eth"]`
    parent: Vec<String>,
    access: AccessControl,
    /// Latest generation handed out per label
    generations: HashMap<LabelId, u32>,
    labels: HashMap<LabelId, String>,
    owners: HashMap<NameId, Address>,
}

impl Registry {
    pub fn new(id: RegistryId, parent: Vec<String>, admin: Address) -> Self {
        Self {
            id,
            parent,
            access: AccessControl::new(admin),
            generations: HashMap::new(),
            labels: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn parent(&self) -> &[String] {
        &self.parent
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub(crate) fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    /// The full name path of `label` under this registry
    pub fn name_path(&self, label: &str) -> Vec<String> {
        std::iter::once(label.to_string())
            .chain(self.parent.iter().cloned())
            .collect()
    }

    /// Register a new name. The caller needs REGISTRAR at the root.
    pub fn register<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        data: &TransferData,
    ) -> Result<NameId, RegistryError> {
        self.access
            .check_root_roles(RoleBitmap::owner(Roles::REGISTRAR), ctx.caller)?;
        self.mint(ctx, data, false)
    }

    /// Like [`register`](Self::register), but an unexpired ownerless
    /// registration of the label is taken over instead of rejected. The
    /// resulting expiry is the later of the two.
    pub fn reclaim<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        data: &TransferData,
    ) -> Result<NameId, RegistryError> {
        self.access
            .check_root_roles(RoleBitmap::owner(Roles::REGISTRAR), ctx.caller)?;
        self.mint(ctx, data, true)
    }

    fn mint<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        data: &TransferData,
        over_mirror: bool,
    ) -> Result<NameId, RegistryError> {
        if !is_valid_label(&data.label) {
            return Err(RegistryError::InvalidLabel(data.label.clone()));
        }
        if data.owner.is_zero() {
            return Err(RegistryError::InvalidOwner(data.owner));
        }
        if data.expiry <= ctx.now {
            return Err(RegistryError::ExpiryInPast {
                expiry: data.expiry,
                now: ctx.now,
            });
        }

        let label = data.label_id();
        let mut expiry = data.expiry;
        if let Some(previous) = self.current_id(label) {
            if let Some(entry) = ctx.store.entry(self.id, previous) {
                if !entry.is_expired(ctx.now) {
                    let mirrored = over_mirror && !self.owners.contains_key(&previous);
                    if !mirrored {
                        return Err(RegistryError::NameAlreadyRegistered {
                            label: data.label.clone(),
                            id: previous,
                        });
                    }
                    expiry = expiry.max(entry.expiry);
                }
                // the previous registration is done with, whether it
                //  decayed or was a mirror
                ctx.store.remove_entry(self.id, previous);
            }
            self.access.revoke_all(previous.resource());
            if let Some(owner) = self.owners.remove(&previous) {
                ctx.emit(Event::Transfer {
                    operator: ctx.caller,
                    from: owner,
                    to: Address::ZERO,
                    id: previous,
                });
            }
        }

        let generation = match self.generations.get(&label) {
            Some(generation) => generation
                .checked_add(1)
                .ok_or(RegistryError::GenerationsExhausted(label))?,
            None => 0,
        };
        let id = NameId::new(label, generation);
        self.generations.insert(label, generation);
        self.labels.insert(label, data.label.clone());

        ctx.store.set_entry(
            self.id,
            id,
            Entry {
                subregistry: data.subregistry,
                resolver: data.resolver,
                expiry,
                aux: 0,
            },
        );
        self.owners.insert(id, data.owner);
        let granted = self
            .access
            .grant_unchecked(id.resource(), data.roles, data.owner);

        tracing::info!(
            "registered {:?} as {} to {} until {}",
            data.label,
            id,
            data.owner,
            expiry
        );
        ctx.emit(Event::Transfer {
            operator: ctx.caller,
            from: Address::ZERO,
            to: data.owner,
            id,
        });
        ctx.emit(Event::NameRegistered {
            id,
            label: data.label.clone(),
            owner: data.owner,
            expiry,
        });
        if !granted.is_empty() {
            ctx.emit(Event::RolesGranted {
                resource: id.resource(),
                roles: granted,
                account: data.owner,
            });
        }
        Ok(id)
    }

    /// Extend the expiry of the current registration of a label.
    ///
    /// Expiry only ever moves forward. Ownerless registrations (mirrors of
    /// a name that was ejected elsewhere) can be renewed even after they
    /// expired; owned ones can not.
    pub fn renew<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        id: NameId,
        expiry: Timestamp,
    ) -> Result<(), RegistryError> {
        let entry = self.current_entry(ctx.store, id)?;
        self.access
            .check_roles(id.resource(), RoleBitmap::owner(Roles::RENEW), ctx.caller)?;
        if entry.is_expired(ctx.now) && self.owners.contains_key(&id) {
            return Err(RegistryError::NameExpired {
                id,
                expiry: entry.expiry,
            });
        }
        if expiry <= entry.expiry {
            return Err(RegistryError::RenewalNotIncreasing {
                id,
                current: entry.expiry,
                requested: expiry,
            });
        }

        ctx.store.set_expiry(self.id, id, expiry);
        tracing::info!("renewed {} until {}", id, expiry);
        ctx.emit(Event::ExpiryUpdated { id, expiry });
        Ok(())
    }

    /// Drop ownership of a name and every role at its resource.
    ///
    /// With `keep_entry` the stored entry survives so the name can still be
    /// resolved and renewed as a mirror; otherwise it is removed.
    pub fn burn<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        id: NameId,
        keep_entry: bool,
    ) -> Result<(), RegistryError> {
        self.current_entry(ctx.store, id)?;
        self.access.check_roles(
            id.resource(),
            RoleBitmap::owner(Roles::CAN_TRANSFER),
            ctx.caller,
        )?;

        let owner = self.owners.remove(&id);
        self.access.revoke_all(id.resource());
        if !keep_entry {
            ctx.store.remove_entry(self.id, id);
        }

        tracing::info!("burned {} (kept entry: {})", id, keep_entry);
        if let Some(owner) = owner {
            ctx.emit(Event::Transfer {
                operator: ctx.caller,
                from: owner,
                to: Address::ZERO,
                id,
            });
        }
        ctx.emit(Event::NameBurned {
            id,
            kept_entry: keep_entry,
        });
        Ok(())
    }

    pub fn set_subregistry<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        id: NameId,
        subregistry: Option<Address>,
    ) -> Result<(), RegistryError> {
        self.live_entry(ctx.store, ctx.now, id)?;
        self.access.check_roles(
            id.resource(),
            RoleBitmap::owner(Roles::SET_SUBREGISTRY),
            ctx.caller,
        )?;
        ctx.store.set_subregistry(self.id, id, subregistry);
        ctx.emit(Event::SubregistryUpdated { id, subregistry });
        Ok(())
    }

    pub fn set_resolver<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        id: NameId,
        resolver: Option<Address>,
    ) -> Result<(), RegistryError> {
        self.live_entry(ctx.store, ctx.now, id)?;
        self.access.check_roles(
            id.resource(),
            RoleBitmap::owner(Roles::SET_RESOLVER),
            ctx.caller,
        )?;
        ctx.store.set_resolver(self.id, id, resolver);
        ctx.emit(Event::ResolverUpdated { id, resolver });
        Ok(())
    }

    /// Move a name's token from `from` to `to`, together with every role
    /// `from` holds at the name's resource
    pub fn safe_transfer_from<D: Datastore>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        from: Address,
        to: Address,
        id: NameId,
    ) -> Result<(), RegistryError> {
        if ctx.caller != from {
            return Err(RegistryError::NotOwner {
                id,
                account: ctx.caller,
            });
        }
        if to.is_zero() {
            return Err(RegistryError::InvalidOwner(to));
        }
        let entry = self.live_entry(ctx.store, ctx.now, id)?;
        if self.owners.get(&id) != Some(&from) {
            return Err(RegistryError::NotOwner { id, account: from });
        }
        self.access
            .check_roles(id.resource(), RoleBitmap::owner(Roles::CAN_TRANSFER), from)?;

        self.owners.insert(id, to);
        self.access.transfer_all(id.resource(), from, to);
        tracing::debug!("transferred {} from {} to {} (expiry {})", id, from, to, entry.expiry);
        ctx.emit(Event::Transfer {
            operator: ctx.caller,
            from,
            to,
            id,
        });
        Ok(())
    }

    pub fn grant_roles<D>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, RegistryError> {
        let granted = self
            .access
            .grant_roles(ctx.caller, resource, roles, account)?;
        if !granted.is_empty() {
            ctx.emit(Event::RolesGranted {
                resource,
                roles: granted,
                account,
            });
        }
        Ok(granted)
    }

    pub fn revoke_roles<D>(
        &mut self,
        ctx: &mut TxContext<'_, D>,
        resource: Resource,
        roles: RoleBitmap,
        account: Address,
    ) -> Result<RoleBitmap, RegistryError> {
        let revoked = self
            .access
            .revoke_roles(ctx.caller, resource, roles, account)?;
        if !revoked.is_empty() {
            ctx.emit(Event::RolesRevoked {
                resource,
                roles: revoked,
                account,
            });
        }
        Ok(revoked)
    }

    /* Queries */

    /// The latest registration of `label`, live or not
    pub fn current_id(&self, label: LabelId) -> Option<NameId> {
        self.generations
            .get(&label)
            .map(|generation| NameId::new(label, *generation))
    }

    pub fn label(&self, label: LabelId) -> Option<&str> {
        self.labels.get(&label).map(String::as_str)
    }

    pub fn is_available<D: Datastore>(&self, store: &D, now: Timestamp, label: &str) -> bool {
        self.is_label_available(store, now, LabelId::of(label))
    }

    pub fn is_label_available<D: Datastore>(
        &self,
        store: &D,
        now: Timestamp,
        label: LabelId,
    ) -> bool {
        self.current_id(label)
            .and_then(|id| store.entry(self.id, id))
            .map(|entry| entry.is_expired(now))
            .unwrap_or(true)
    }

    /// The owner of a live name
    pub fn owner_of<D: Datastore>(&self, store: &D, now: Timestamp, id: NameId) -> Option<Address> {
        let entry = store.entry(self.id, id)?;
        if entry.is_expired(now) {
            return None;
        }
        self.owners.get(&id).copied()
    }

    /// Whether `id` is a stored registration nobody owns, i.e. the shadow
    /// left behind when a name was ejected to the other ledger
    pub fn is_mirror<D: Datastore>(&self, store: &D, id: NameId) -> bool {
        self.current_id(id.label) == Some(id)
            && store.entry(self.id, id).is_some()
            && !self.owners.contains_key(&id)
    }

    pub fn entry<D: Datastore>(&self, store: &D, id: NameId) -> Option<Entry> {
        store.scope(self.id).entry(id)
    }

    pub fn name_record<D: Datastore>(
        &self,
        store: &D,
        now: Timestamp,
        label: &str,
    ) -> Option<NameRecord> {
        let id = self.current_id(LabelId::of(label))?;
        let entry = store.entry(self.id, id)?;
        let owner = self.owner_of(store, now, id);
        let roles = owner
            .map(|owner| self.access.roles(id.resource(), owner))
            .unwrap_or_default();
        Some(NameRecord {
            label: label.to_string(),
            id,
            owner,
            roles,
            entry,
        })
    }

    /// Roles `account` holds at exactly the resource of `id`
    pub fn roles(&self, id: NameId, account: Address) -> RoleBitmap {
        self.access.roles(id.resource(), account)
    }

    /// The stored entry for `id`, provided `id` is the current generation
    fn current_entry<D: Datastore>(&self, store: &D, id: NameId) -> Result<Entry, RegistryError> {
        if self.current_id(id.label) != Some(id) {
            return Err(RegistryError::NameNotFound(id));
        }
        store
            .entry(self.id, id)
            .ok_or(RegistryError::NameNotFound(id))
    }

    fn live_entry<D: Datastore>(
        &self,
        store: &D,
        now: Timestamp,
        id: NameId,
    ) -> Result<Entry, RegistryError> {
        let entry = self.current_entry(store, id)?;
        if entry.is_expired(now) {
            return Err(RegistryError::NameExpired {
                id,
                expiry: entry.expiry,
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDatastore;

    const NOW: Timestamp = Timestamp(1_000);
    const YEAR: u64 = 365 * 24 * 60 * 60;

    struct Harness {
        registry: Registry,
        store: MemoryDatastore,
        events: Vec<Event>,
        admin: Address,
        now: Timestamp,
    }

    impl Harness {
        fn new() -> Self {
            let admin = Address::derive("admin");
            Self {
                registry: Registry::new(Address::derive("registry"), vec!["eth".into()], admin),
                store: MemoryDatastore::new(),
                events: Vec::new(),
                admin,
                now: NOW,
            }
        }

        fn ctx(&mut self, caller: Address) -> (&mut Registry, TxContext<'_, MemoryDatastore>) {
            (
                &mut self.registry,
                TxContext::new(caller, self.now, &mut self.store, &mut self.events),
            )
        }

        fn register(&mut self, label: &str, owner: Address) -> Result<NameId, RegistryError> {
            let data = TransferData::new(
                label,
                owner,
                RoleBitmap::full(Roles::all() - Roles::REGISTRAR - Roles::EJECTOR),
                NOW.saturating_add(YEAR),
            );
            let admin = self.admin;
            let (registry, mut ctx) = self.ctx(admin);
            registry.register(&mut ctx, &data)
        }
    }

    #[test]
    fn test_register_mints_generation_zero() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();

        assert_eq!(id, NameId::new(LabelId::of("alice"), 0));
        assert_eq!(h.registry.owner_of(&h.store, NOW, id), Some(alice));
        assert!(!h.registry.is_available(&h.store, NOW, "alice"));
        assert!(h.registry.roles(id, alice).contains(RoleBitmap::owner(Roles::RENEW)));
        assert!(h.events.contains(&Event::Transfer {
            operator: h.admin,
            from: Address::ZERO,
            to: alice,
            id,
        }));
    }

    #[test]
    fn test_register_requires_registrar() {
        let mut h = Harness::new();
        let mallory = Address::derive("mallory");
        let data = TransferData::new("alice", mallory, RoleBitmap::EMPTY, NOW.saturating_add(YEAR));
        let (registry, mut ctx) = h.ctx(mallory);
        let err = registry.register(&mut ctx, &data).unwrap_err();
        assert!(matches!(err, RegistryError::AccessControl(_)));
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let mut h = Harness::new();
        assert!(matches!(
            h.register("alice.eth", Address::derive("alice")),
            Err(RegistryError::InvalidLabel(_))
        ));
        assert!(matches!(
            h.register("alice", Address::ZERO),
            Err(RegistryError::InvalidOwner(_))
        ));

        let data = TransferData::new("alice", Address::derive("alice"), RoleBitmap::EMPTY, NOW);
        let admin = h.admin;
        let (registry, mut ctx) = h.ctx(admin);
        assert!(matches!(
            registry.register(&mut ctx, &data),
            Err(RegistryError::ExpiryInPast { .. })
        ));
    }

    #[test]
    fn test_register_taken_label_fails() {
        let mut h = Harness::new();
        h.register("alice", Address::derive("alice")).unwrap();
        assert!(matches!(
            h.register("alice", Address::derive("bob")),
            Err(RegistryError::NameAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_expired_name_is_available_and_reregisters_fresh() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let first = h.register("alice", alice).unwrap();

        h.now = NOW.saturating_add(YEAR);
        assert!(h.registry.is_available(&h.store, h.now, "alice"));
        assert_eq!(h.registry.owner_of(&h.store, h.now, first), None);

        let data = TransferData::new("alice", bob, RoleBitmap::EMPTY, h.now.saturating_add(YEAR));
        let admin = h.admin;
        let (registry, mut ctx) = h.ctx(admin);
        let second = registry.register(&mut ctx, &data).unwrap();

        assert_eq!(second.generation, 1);
        assert_ne!(first.resource(), second.resource());
        assert!(h.registry.roles(first, alice).is_empty());
        assert!(h.registry.roles(second, alice).is_empty());
    }

    #[test]
    fn test_renew_must_increase_expiry() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();
        let current = NOW.saturating_add(YEAR);

        let (registry, mut ctx) = h.ctx(alice);
        assert_eq!(
            registry.renew(&mut ctx, id, current),
            Err(RegistryError::RenewalNotIncreasing {
                id,
                current,
                requested: current,
            })
        );
        registry.renew(&mut ctx, id, current.saturating_add(1)).unwrap();
        assert_eq!(
            h.registry.entry(&h.store, id).map(|e| e.expiry),
            Some(current.saturating_add(1))
        );
    }

    #[test]
    fn test_renew_stale_generation_is_not_found() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();
        let admin = h.admin;
        let (registry, mut ctx) = h.ctx(admin);
        registry.burn(&mut ctx, id, false).unwrap();

        let next = h.register("alice", alice).unwrap();
        let (registry, mut ctx) = h.ctx(admin);
        assert_eq!(
            registry.renew(&mut ctx, id, Timestamp(u64::MAX)),
            Err(RegistryError::NameNotFound(id))
        );
        registry.renew(&mut ctx, next, Timestamp(u64::MAX)).unwrap();
    }

    #[test]
    fn test_soft_burn_keeps_entry_and_allows_renewal() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let resolver = Address::derive("resolver");
        let id = h.register("alice", alice).unwrap();

        let (registry, mut ctx) = h.ctx(alice);
        registry.set_resolver(&mut ctx, id, Some(resolver)).unwrap();
        registry.burn(&mut ctx, id, true).unwrap();

        assert_eq!(h.registry.owner_of(&h.store, NOW, id), None);
        assert!(h.registry.is_mirror(&h.store, id));
        assert!(h.registry.roles(id, alice).is_empty());
        assert_eq!(h.store.resolver_of(h.registry.id(), id), Some(resolver));
        // still live, so still not available
        assert!(!h.registry.is_available(&h.store, NOW, "alice"));

        let admin = h.admin;
        let (registry, mut ctx) = h.ctx(admin);
        registry.renew(&mut ctx, id, Timestamp(u64::MAX)).unwrap();
    }

    #[test]
    fn test_hard_burn_frees_label() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();
        let (registry, mut ctx) = h.ctx(alice);
        registry.burn(&mut ctx, id, false).unwrap();

        assert!(h.registry.entry(&h.store, id).is_none());
        assert!(h.registry.is_available(&h.store, NOW, "alice"));
    }

    #[test]
    fn test_reclaim_takes_over_mirror_with_later_expiry() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();
        let (registry, mut ctx) = h.ctx(alice);
        registry.burn(&mut ctx, id, true).unwrap();

        // a plain register still sees the label as taken
        assert!(matches!(
            h.register("alice", alice),
            Err(RegistryError::NameAlreadyRegistered { .. })
        ));

        let data = TransferData::new("alice", alice, RoleBitmap::EMPTY, NOW.saturating_add(10));
        let admin = h.admin;
        let (registry, mut ctx) = h.ctx(admin);
        let reclaimed = registry.reclaim(&mut ctx, &data).unwrap();

        assert_eq!(reclaimed.generation, 1);
        assert_eq!(
            h.registry.entry(&h.store, reclaimed).map(|e| e.expiry),
            Some(NOW.saturating_add(YEAR))
        );
        assert!(h.registry.entry(&h.store, id).is_none());
    }

    #[test]
    fn test_transfer_moves_roles() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let id = h.register("alice", alice).unwrap();
        let roles = h.registry.roles(id, alice);

        let (registry, mut ctx) = h.ctx(bob);
        assert!(matches!(
            registry.safe_transfer_from(&mut ctx, alice, bob, id),
            Err(RegistryError::NotOwner { .. })
        ));

        let (registry, mut ctx) = h.ctx(alice);
        registry.safe_transfer_from(&mut ctx, alice, bob, id).unwrap();
        assert_eq!(h.registry.owner_of(&h.store, NOW, id), Some(bob));
        assert_eq!(h.registry.roles(id, bob), roles);
        assert!(h.registry.roles(id, alice).is_empty());
    }

    #[test]
    fn test_setters_reject_expired_names() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();
        h.now = NOW.saturating_add(YEAR);

        let (registry, mut ctx) = h.ctx(alice);
        assert!(matches!(
            registry.set_subregistry(&mut ctx, id, Some(Address::random())),
            Err(RegistryError::NameExpired { .. })
        ));
        assert!(matches!(
            registry.renew(&mut ctx, id, Timestamp(u64::MAX)),
            Err(RegistryError::NameExpired { .. })
        ));
    }

    #[test]
    fn test_name_record() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let id = h.register("alice", alice).unwrap();

        let record = h.registry.name_record(&h.store, NOW, "alice").unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.owner, Some(alice));
        assert!(record.is_live(NOW));
        assert_eq!(h.registry.name_path("alice"), vec!["alice", "eth"]);
        assert!(h.registry.name_record(&h.store, NOW, "bob").is_none());
    }
}
