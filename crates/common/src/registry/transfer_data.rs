use serde::{Deserialize, Serialize};

use crate::access_control::RoleBitmap;
use crate::types::{Address, LabelId, Timestamp};

/// Everything needed to (re)create a registration.
///
/// Used both as the argument to a local registration and as the payload
/// carried across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub label: String,
    pub owner: Address,
    pub subregistry: Option<Address>,
    pub resolver: Option<Address>,
    /// Roles granted to `owner` at the new registration
    pub roles: RoleBitmap,
    pub expiry: Timestamp,
}

impl TransferData {
    pub fn new(
        label: impl Into<String>,
        owner: Address,
        roles: RoleBitmap,
        expiry: Timestamp,
    ) -> Self {
        Self {
            label: label.into(),
            owner,
            subregistry: None,
            resolver: None,
            roles,
            expiry,
        }
    }

    pub fn with_subregistry(mut self, subregistry: Address) -> Self {
        self.subregistry = Some(subregistry);
        self
    }

    pub fn with_resolver(mut self, resolver: Address) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn label_id(&self) -> LabelId {
        LabelId::of(&self.label)
    }
}
