//! Namespaced entry storage shared by every registry on a ledger

pub mod memory;
pub mod provider;

pub use memory::MemoryDatastore;
pub use provider::{Datastore, Entry, Scoped};
