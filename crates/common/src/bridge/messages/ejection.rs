use serde::{Deserialize, Serialize};

use crate::registry::TransferData;

/// A name leaving its ledger, with everything needed to recreate it on
/// the other side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EjectionMessage {
    /// Full label path, closest label first, e.g. `["alice", "eth"]`
    pub name: Vec<String>,
    pub transfer: TransferData,
    /// How many times the label has crossed the bridge, this crossing
    /// included. A receiver only accepts crossings newer than any it has
    /// already seen for the label.
    pub crossing: u64,
}

impl EjectionMessage {
    pub fn new(name: Vec<String>, transfer: TransferData, crossing: u64) -> Self {
        Self {
            name,
            transfer,
            crossing,
        }
    }

    /// The dotted form of the name, for logs
    pub fn dotted(&self) -> String {
        self.name.join(".")
    }
}
