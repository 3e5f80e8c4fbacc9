use serde::{Deserialize, Serialize};

use crate::types::Address;

/// How to bootstrap one ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Human readable name used in logs
    pub name: String,
    /// Receives every role at the root of both the registry and the
    ///  controller
    pub admin: Address,
    pub registry: Address,
    /// Labels of the name the registry serves, closest first
    #[serde(default)]
    pub parent: Vec<String>,
    /// Maximum number of undelivered outbound messages
    #[serde(default)]
    pub outbox_capacity: Option<usize>,
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub address: Address,
    /// The account allowed to deliver inbound messages
    pub transport: Address,
    #[serde(default)]
    pub denied_owners: Vec<Address>,
}

impl LedgerConfig {
    /// A config with every address derived from `name`
    pub fn derived(name: &str, parent: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            admin: Address::derive(&format!("{name}/admin")),
            registry: Address::derive(&format!("{name}/registry")),
            parent: parent.iter().map(|label| label.to_string()).collect(),
            outbox_capacity: None,
            controller: ControllerConfig {
                address: Address::derive(&format!("{name}/controller")),
                transport: Address::derive(&format!("{name}/transport")),
                denied_owners: Vec::new(),
            },
        }
    }
}
