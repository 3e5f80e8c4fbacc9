use crate::events::Event;
use crate::types::{Address, Timestamp};

/// Everything a component needs while executing inside a ledger
/// transaction: who is calling, what time the ledger thinks it is, the
/// shared datastore and the transaction's event buffer.
#[derive(Debug)]
pub struct TxContext<'a, D> {
    pub caller: Address,
    pub now: Timestamp,
    pub store: &'a mut D,
    events: &'a mut Vec<Event>,
}

impl<'a, D> TxContext<'a, D> {
    pub fn new(
        caller: Address,
        now: Timestamp,
        store: &'a mut D,
        events: &'a mut Vec<Event>,
    ) -> Self {
        Self {
            caller,
            now,
            store,
            events,
        }
    }

    /// Reborrow this context with a different caller, e.g. when a
    ///  controller calls into the registry on its own behalf
    pub fn as_caller(&mut self, caller: Address) -> TxContext<'_, D> {
        TxContext {
            caller,
            now: self.now,
            store: &mut *self.store,
            events: &mut *self.events,
        }
    }

    pub fn emit(&mut self, event: Event) {
        tracing::trace!("emit {:?}", event);
        self.events.push(event);
    }
}
