use serde::{Deserialize, Serialize};

use crate::types::{Address, NameId, RegistryId, Timestamp};

/// The persisted record for one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Registry responsible for names below this one
    pub subregistry: Option<Address>,
    /// Resolver answering lookups for this name
    pub resolver: Option<Address>,
    /// When the registration stops being live
    pub expiry: Timestamp,
    /// Free-form data owned by the registry
    pub aux: u32,
}

impl Entry {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry <= now
    }
}

/// Key-value storage of [`Entry`]s, namespaced by the writing registry.
///
/// Every write names the registry performing it and lands in that
/// registry's namespace only; there is no way to address somebody else's
/// slice on the write path. Reads can target any namespace, which is what
/// lets a registry look up its parent's resolver for a name.
///
/// Implementations should be cheap to clone: a ledger snapshots its whole
/// state before every transaction and restores it on failure.
pub trait Datastore: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Read an entry from `registry`'s namespace
    fn entry(&self, registry: RegistryId, id: NameId) -> Option<Entry>;

    /// Write an entry into the caller's own namespace
    fn set_entry(&mut self, caller: RegistryId, id: NameId, entry: Entry);

    /// Remove an entry from the caller's own namespace
    ///
    /// # Returns
    /// * `Some(Entry)` - the entry that was removed
    /// * `None` - nothing was stored under `id`
    fn remove_entry(&mut self, caller: RegistryId, id: NameId) -> Option<Entry>;

    /// Number of entries stored in `registry`'s namespace
    fn len(&self, registry: RegistryId) -> usize;

    fn subregistry_of(&self, registry: RegistryId, id: NameId) -> Option<Address> {
        self.entry(registry, id).and_then(|entry| entry.subregistry)
    }

    fn resolver_of(&self, registry: RegistryId, id: NameId) -> Option<Address> {
        self.entry(registry, id).and_then(|entry| entry.resolver)
    }

    fn expiry_of(&self, registry: RegistryId, id: NameId) -> Option<Timestamp> {
        self.entry(registry, id).map(|entry| entry.expiry)
    }

    /// Update one field of an entry in the caller's namespace, creating a
    ///  default entry if none exists
    fn update_entry(&mut self, caller: RegistryId, id: NameId, f: impl FnOnce(&mut Entry)) {
        let mut entry = self.entry(caller, id).unwrap_or_default();
        f(&mut entry);
        self.set_entry(caller, id, entry);
    }

    fn set_subregistry(&mut self, caller: RegistryId, id: NameId, subregistry: Option<Address>) {
        self.update_entry(caller, id, |entry| entry.subregistry = subregistry);
    }

    fn set_resolver(&mut self, caller: RegistryId, id: NameId, resolver: Option<Address>) {
        self.update_entry(caller, id, |entry| entry.resolver = resolver);
    }

    fn set_expiry(&mut self, caller: RegistryId, id: NameId, expiry: Timestamp) {
        self.update_entry(caller, id, |entry| entry.expiry = expiry);
    }

    /// A read-only view of one registry's namespace
    fn scope(&self, registry: RegistryId) -> Scoped<'_, Self> {
        Scoped {
            store: self,
            registry,
        }
    }
}

/// Reads implicitly bound to one registry's namespace
#[derive(Debug)]
pub struct Scoped<'a, D> {
    store: &'a D,
    registry: RegistryId,
}

impl<D: Datastore> Scoped<'_, D> {
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    pub fn entry(&self, id: NameId) -> Option<Entry> {
        self.store.entry(self.registry, id)
    }

    pub fn subregistry(&self, id: NameId) -> Option<Address> {
        self.store.subregistry_of(self.registry, id)
    }

    pub fn resolver(&self, id: NameId) -> Option<Address> {
        self.store.resolver_of(self.registry, id)
    }

    pub fn expiry(&self, id: NameId) -> Option<Timestamp> {
        self.store.expiry_of(self.registry, id)
    }
}
