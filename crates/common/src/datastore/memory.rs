use std::collections::HashMap;

use super::provider::{Datastore, Entry};
use crate::types::{NameId, RegistryId};

/// In-memory datastore using HashMaps
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    /// Store entries: registry -> name -> entry
    namespaces: HashMap<RegistryId, HashMap<NameId, Entry>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Datastore for MemoryDatastore {
    fn entry(&self, registry: RegistryId, id: NameId) -> Option<Entry> {
        self.namespaces
            .get(&registry)
            .and_then(|entries| entries.get(&id))
            .copied()
    }

    fn set_entry(&mut self, caller: RegistryId, id: NameId, entry: Entry) {
        self.namespaces
            .entry(caller)
            .or_default()
            .insert(id, entry);
    }

    fn remove_entry(&mut self, caller: RegistryId, id: NameId) -> Option<Entry> {
        let entries = self.namespaces.get_mut(&caller)?;
        let removed = entries.remove(&id);
        if entries.is_empty() {
            self.namespaces.remove(&caller);
        }
        removed
    }

    fn len(&self, registry: RegistryId) -> usize {
        self.namespaces
            .get(&registry)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
