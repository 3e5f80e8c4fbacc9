use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::access_control::{RoleBitmap, Roles};
use crate::bridge::messages::encode_transfer_data;
use crate::bridge::{BridgeError, IngressOutcome};
use crate::clock::ManualClock;
use crate::ledger::{Ledger, LedgerConfig};
use crate::registry::TransferData;
use crate::types::{Address, NameId, Timestamp};

/// Where both ledgers' clocks start
pub const GENESIS: Timestamp = Timestamp(1_700_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Two ledgers serving the same parent name, bridged to each other
pub struct TestBridge {
    a: Ledger,
    b: Ledger,
    config_a: LedgerConfig,
    config_b: LedgerConfig,
    clock_a: ManualClock,
    clock_b: ManualClock,
}

impl TestBridge {
    pub fn new() -> Result<Self> {
        Self::with_configs(
            LedgerConfig::derived("a", &["eth"]),
            LedgerConfig::derived("b", &["eth"]),
        )
    }

    pub fn with_configs(config_a: LedgerConfig, config_b: LedgerConfig) -> Result<Self> {
        let clock_a = ManualClock::new(GENESIS);
        let clock_b = ManualClock::new(GENESIS);
        let a = Ledger::in_memory(&config_a, Arc::new(clock_a.clone()))?;
        let b = Ledger::in_memory(&config_b, Arc::new(clock_b.clone()))?;
        Ok(Self {
            a,
            b,
            config_a,
            config_b,
            clock_a,
            clock_b,
        })
    }

    pub fn ledger(&self, side: Side) -> &Ledger {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn config(&self, side: Side) -> &LedgerConfig {
        match side {
            Side::A => &self.config_a,
            Side::B => &self.config_b,
        }
    }

    pub fn clock(&self, side: Side) -> &ManualClock {
        match side {
            Side::A => &self.clock_a,
            Side::B => &self.clock_b,
        }
    }

    pub fn admin(&self, side: Side) -> Address {
        self.config(side).admin
    }

    pub fn controller(&self, side: Side) -> Address {
        self.config(side).controller.address
    }

    /// A stable account address for a test participant
    pub fn account(&self, name: &str) -> Address {
        Address::derive(&format!("account/{name}"))
    }

    /// Advance both clocks
    pub fn advance(&self, secs: u64) {
        self.clock_a.advance(secs);
        self.clock_b.advance(secs);
    }

    /// The roles an owner gets for a normal, ejectable name
    pub fn owner_roles() -> RoleBitmap {
        RoleBitmap::full(
            Roles::RENEW | Roles::SET_SUBREGISTRY | Roles::SET_RESOLVER | Roles::CAN_TRANSFER,
        )
    }

    /// Register `label` to `owner` for `duration` seconds as the admin
    pub fn register(
        &self,
        side: Side,
        label: &str,
        owner: Address,
        duration: u64,
    ) -> Result<NameId> {
        let ledger = self.ledger(side);
        let data = TransferData::new(
            label,
            owner,
            Self::owner_roles(),
            ledger.now().saturating_add(duration),
        );
        Ok(ledger.register(self.admin(side), data)?)
    }

    /// Eject `label` from `side` by having `owner` transfer its token to
    /// the controller, naming `owner` as the owner on the other side
    pub fn eject(&self, side: Side, label: &str, owner: Address) -> Result<NameId> {
        let ledger = self.ledger(side);
        let id = ledger
            .current_id(label)
            .ok_or_else(|| anyhow!("{label} is not registered on {side:?}"))?;
        let data = TransferData::new(label, owner, Self::owner_roles(), Timestamp(0));
        ledger.safe_transfer_from(
            owner,
            owner,
            self.controller(side),
            id,
            &encode_transfer_data(&data)?,
        )?;
        Ok(id)
    }

    /// Deliver everything `from` has queued to the other ledger, in order,
    /// reporting the outcome of each delivery
    pub fn relay(&self, from: Side) -> Vec<Result<IngressOutcome, BridgeError>> {
        let to = from.other();
        let transport = self.config(to).controller.transport;
        self.ledger(from)
            .take_outbound()
            .into_iter()
            .map(|message| self.ledger(to).on_message(transport, &message.payload))
            .collect()
    }

    /// Relay in both directions until neither ledger has anything queued,
    /// failing on the first rejected delivery
    pub fn relay_all(&self) -> Result<Vec<IngressOutcome>> {
        let mut outcomes = Vec::new();
        while self.a.outbound_len() > 0 || self.b.outbound_len() > 0 {
            for side in [Side::A, Side::B] {
                for outcome in self.relay(side) {
                    outcomes.push(outcome?);
                }
            }
        }
        Ok(outcomes)
    }
}
