use serde::{Deserialize, Serialize};

use crate::types::{LabelId, Timestamp};

/// A new expiry for a label whose live registration sits on the sending
/// ledger.
///
/// Resources are local to each ledger, so the label hash is the only
/// identifier that means the same thing on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalSyncMessage {
    pub label: LabelId,
    pub expiry: Timestamp,
}

impl RenewalSyncMessage {
    pub fn new(label: LabelId, expiry: Timestamp) -> Self {
        Self { label, expiry }
    }
}
