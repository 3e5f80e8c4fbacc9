use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use common::bridge::BridgeError;
use common::clock::{Clock, SystemClock};
use common::ledger::Ledger;
use common::types::Address;

use super::config::{Config, ConfigError, RelayerConfig};
use super::relayer::{run_poller, run_worker, Relayer, Route};

/// Main service state - both ledgers and how to relay between them
#[derive(Debug, Clone)]
pub struct State {
    ledger_a: Ledger,
    ledger_b: Ledger,
    /// Transport identities accepted by the controllers of A and B
    transport_a: Address,
    transport_b: Address,
    relayer_config: RelayerConfig,
}

impl State {
    pub fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, StateSetupError> {
        config.validate()?;
        let ledger_a = Ledger::in_memory(&config.ledger_a, clock.clone())?;
        let ledger_b = Ledger::in_memory(&config.ledger_b, clock)?;
        tracing::info!(
            "bridging {} and {} under {:?}",
            ledger_a.name(),
            ledger_b.name(),
            config.ledger_a.parent
        );

        Ok(Self {
            ledger_a,
            ledger_b,
            transport_a: config.ledger_a.controller.transport,
            transport_b: config.ledger_b.controller.transport,
            relayer_config: config.relayer.clone(),
        })
    }

    pub fn ledger_a(&self) -> &Ledger {
        &self.ledger_a
    }

    pub fn ledger_b(&self) -> &Ledger {
        &self.ledger_b
    }

    /// Both directions of the bridge, A to B first
    pub fn routes(&self) -> [Route; 2] {
        [
            Route {
                source: self.ledger_a.clone(),
                destination: self.ledger_b.clone(),
                transport: self.transport_b,
            },
            Route {
                source: self.ledger_b.clone(),
                destination: self.ledger_a.clone(),
                transport: self.transport_a,
            },
        ]
    }

    /// Spawn a poller and a worker for each direction
    ///
    /// Returns the relayers, for inspecting dead letters, and the task
    /// handles, which finish once shutdown is signalled.
    pub fn spawn_relayers(
        &self,
        shutdown_rx: watch::Receiver<()>,
    ) -> (Vec<Relayer>, Vec<JoinHandle<()>>) {
        let mut relayers = Vec::new();
        let mut handles = Vec::new();
        for route in self.routes() {
            let (relayer, receiver) = Relayer::new(route, self.relayer_config.clone());
            handles.push(tokio::spawn(run_poller(
                relayer.clone(),
                shutdown_rx.clone(),
            )));
            handles.push(tokio::spawn(run_worker(
                relayer.clone(),
                receiver.into_async(),
                shutdown_rx.clone(),
            )));
            relayers.push(relayer);
        }
        (relayers, handles)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("ledger setup error: {0}")]
    Ledger(#[from] BridgeError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::access_control::{RoleBitmap, Roles};
    use common::bridge::messages::encode_transfer_data;
    use common::clock::ManualClock;
    use common::registry::TransferData;
    use common::types::Timestamp;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_through_spawned_relayers() {
        let config = Config {
            relayer: RelayerConfig {
                poll_interval_ms: 10,
                ..Default::default()
            },
            ..Config::devnet()
        };
        let clock = ManualClock::new(Timestamp(1_000));
        let state = State::with_clock(&config, Arc::new(clock)).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (relayers, handles) = state.spawn_relayers(shutdown_rx);

        let alice = Address::derive("alice");
        let roles = RoleBitmap::full(Roles::RENEW | Roles::SET_SUBREGISTRY | Roles::CAN_TRANSFER);
        let a = state.ledger_a();
        let b = state.ledger_b();
        let id = a
            .register(
                config.ledger_a.admin,
                TransferData::new("alice", alice, roles, Timestamp(5_000)),
            )
            .unwrap();
        a.safe_transfer_from(
            alice,
            alice,
            config.ledger_a.controller.address,
            id,
            &encode_transfer_data(&TransferData::new("alice", alice, roles, Timestamp(0)))
                .unwrap(),
        )
        .unwrap();

        for _ in 0..100 {
            if b.current_id("alice").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let id_b = b.current_id("alice").unwrap();

        // renewal on B reaches A's mirror
        b.renew(alice, id_b, Timestamp(9_000)).unwrap();
        for _ in 0..100 {
            if a.entry(id).map(|entry| entry.expiry) == Some(Timestamp(9_000)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(a.entry(id).unwrap().expiry, Timestamp(9_000));
        assert!(relayers.iter().all(|relayer| relayer.dead_letters().is_empty()));

        shutdown_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
