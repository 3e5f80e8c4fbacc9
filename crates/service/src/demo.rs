//! Scripted trip of one name across the bridge, for devnets
//!
//! Registers the name on ledger A, ejects it to B, renews it on B and
//! waits until the renewal reaches A's mirror. The relayers have to be
//! running for any of it to complete.

use std::time::Duration;

use common::access_control::{RoleBitmap, Roles};
use common::bridge::messages::encode_transfer_data;
use common::bridge::{BridgeError, CodecError};
use common::registry::{RegistryError, TransferData};
use common::types::{Address, LabelId, NameId, Timestamp};

use crate::config::Config;
use crate::state::State;

/// How long to wait for the relayers at each step
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

const YEAR: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

/// Where the name ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoReport {
    pub owner: Address,
    /// The soft-burned registration left behind on A
    pub source: NameId,
    /// The live registration on B
    pub destination: NameId,
    /// Expiry after the renewal on B, as seen on both ledgers
    pub expiry: Timestamp,
}

pub async fn run_demo(
    state: &State,
    config: &Config,
    label: &str,
) -> Result<DemoReport, DemoError> {
    let a = state.ledger_a();
    let b = state.ledger_b();
    let poll = config.relayer.poll_interval();
    let owner = Address::derive(label);
    let roles = RoleBitmap::full(
        Roles::RENEW | Roles::SET_SUBREGISTRY | Roles::SET_RESOLVER | Roles::CAN_TRANSFER,
    );

    let source = a.register(
        config.ledger_a.admin,
        TransferData::new(label, owner, roles, a.now().saturating_add(YEAR)),
    )?;
    tracing::info!("demo: registered {} on {} as {}", label, a.name(), source);

    let data = TransferData::new(label, owner, roles, Timestamp(0));
    a.safe_transfer_from(
        owner,
        owner,
        a.controller_address(),
        source,
        &encode_transfer_data(&data)?,
    )?;
    tracing::info!("demo: ejected {} from {}", label, a.name());

    wait_for("injection", poll, || {
        b.current_id(label).and_then(|id| b.owner_of(id)) == Some(owner)
    })
    .await?;
    let destination = b
        .current_id(label)
        .ok_or(RegistryError::LabelNotFound(LabelId::of(label)))?;
    tracing::info!("demo: {} is live on {} as {}", label, b.name(), destination);

    let current = b
        .entry(destination)
        .ok_or(RegistryError::NameNotFound(destination))?
        .expiry;
    let expiry = current.saturating_add(YEAR);
    b.renew(owner, destination, expiry)?;

    wait_for("renewal sync", poll, || {
        a.entry(source).map(|entry| entry.expiry) == Some(expiry)
    })
    .await?;
    tracing::info!(
        "demo: {} renewed on {} until {}, mirror on {} in sync",
        label,
        b.name(),
        expiry,
        a.name()
    );

    Ok(DemoReport {
        owner,
        source,
        destination,
        expiry,
    })
}

async fn wait_for(
    what: &'static str,
    poll: Duration,
    mut done: impl FnMut() -> bool,
) -> Result<(), DemoError> {
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            return Err(DemoError::Timeout(what));
        }
        tokio::time::sleep(poll).await;
    }
    Ok(())
}
