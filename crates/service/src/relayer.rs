//! Queue-based message relay between two ledgers
//!
//! A poller drains the source ledger's outbound queue into a flume channel;
//! a background worker delivers each message to the destination ledger as
//! the destination controller's transport identity. Deliveries that fail
//! with a retryable error are re-queued after a delay, up to the configured
//! number of attempts; everything else ends up in the dead-letter list.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use common::bridge::{BridgeError, IngressOutcome, OutboundMessage};
use common::datastore::{Datastore, MemoryDatastore};
use common::ledger::Ledger;
use common::types::Address;

use crate::config::RelayerConfig;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("delivery queue closed - the worker has been stopped")]
    QueueClosed,
}

/// One direction of the bridge
#[derive(Debug, Clone)]
pub struct Route<D: Datastore = MemoryDatastore> {
    pub source: Ledger<D>,
    pub destination: Ledger<D>,
    /// Identity the destination controller accepts messages from
    pub transport: Address,
}

impl<D: Datastore> Route<D> {
    pub fn name(&self) -> String {
        format!("{}->{}", self.source.name(), self.destination.name())
    }
}

/// A message on its way to the destination ledger
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: OutboundMessage,
    /// Attempts made so far
    pub attempts: u32,
}

/// A message that will not be delivered
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub delivery: Delivery,
    pub error: BridgeError,
}

/// What happened to a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered(IngressOutcome),
    Retrying { attempts: u32 },
    DeadLettered,
}

/// Receiving half of the delivery queue
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: flume::Receiver<Delivery>,
}

impl DeliveryReceiver {
    /// Convert to an async stream for use in tokio::select!
    pub fn into_async(self) -> flume::r#async::RecvStream<'static, Delivery> {
        self.rx.into_stream()
    }
}

#[derive(Debug, Clone)]
pub struct Relayer<D: Datastore = MemoryDatastore> {
    route: Arc<Route<D>>,
    config: RelayerConfig,
    tx: flume::Sender<Delivery>,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl<D: Datastore> Relayer<D> {
    /// Create a relayer for `route`
    ///
    /// Returns a tuple of (relayer, receiver). The receiver should be
    /// passed to [`run_worker`].
    pub fn new(route: Route<D>, config: RelayerConfig) -> (Self, DeliveryReceiver) {
        let (tx, rx) = match config.max_queue_size {
            Some(size) => {
                tracing::info!(
                    "{}: creating bounded delivery queue with size {}",
                    route.name(),
                    size
                );
                flume::bounded(size)
            }
            None => {
                tracing::info!("{}: creating unbounded delivery queue", route.name());
                flume::unbounded()
            }
        };

        let relayer = Self {
            route: Arc::new(route),
            config,
            tx,
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        };
        (relayer, DeliveryReceiver { rx })
    }

    pub fn route(&self) -> &Route<D> {
        &self.route
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    /// Move everything the source has queued into the delivery queue,
    /// waiting for room when the queue is bounded. If the worker is gone,
    /// whatever was not handed over goes back to the source's outbox.
    ///
    /// # Returns
    /// * `Ok(usize)` - the number of messages queued
    /// * `Err(RelayError)` - the worker is gone
    pub async fn poll_once(&self) -> Result<usize, RelayError> {
        let mut messages = self.route.source.take_outbound().into_iter();
        let mut count = 0;
        while let Some(message) = messages.next() {
            let delivery = Delivery {
                message,
                attempts: 0,
            };
            if let Err(delivery) = self.enqueue(delivery).await {
                let pending: Vec<_> = std::iter::once(delivery.message).chain(messages).collect();
                tracing::warn!(
                    "{}: returning {} undelivered messages to the outbox",
                    self.route.name(),
                    pending.len()
                );
                self.route.source.restore_outbound(pending);
                return Err(RelayError::QueueClosed);
            }
            count += 1;
        }
        if count > 0 {
            tracing::debug!("{}: queued {} messages", self.route.name(), count);
        }
        Ok(count)
    }

    /// Hand a delivery to the worker, giving it back if the worker is gone
    async fn enqueue(&self, delivery: Delivery) -> Result<(), Delivery> {
        self.tx
            .send_async(delivery)
            .await
            .map_err(|e| e.into_inner())
    }

    /// Make one delivery attempt
    pub async fn deliver(&self, mut delivery: Delivery) -> DeliveryStatus {
        delivery.attempts += 1;
        let route = &self.route;
        match route
            .destination
            .on_message(route.transport, &delivery.message.payload)
        {
            Ok(outcome) => {
                tracing::info!(
                    "{}: delivered message {} ({:?})",
                    route.name(),
                    delivery.message.sequence,
                    outcome
                );
                DeliveryStatus::Delivered(outcome)
            }
            Err(e) if e.is_retryable() && delivery.attempts < self.config.max_delivery_attempts => {
                let attempts = delivery.attempts;
                tracing::warn!(
                    "{}: message {} failed (attempt {}), retrying: {}",
                    route.name(),
                    delivery.message.sequence,
                    attempts,
                    e
                );
                let relayer = self.clone();
                let delay = self.config.retry_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(delivery) = relayer.enqueue(delivery).await {
                        tracing::error!(
                            "{}: failed to re-queue message {}: {}",
                            relayer.route.name(),
                            delivery.message.sequence,
                            RelayError::QueueClosed
                        );
                    }
                });
                DeliveryStatus::Retrying { attempts }
            }
            Err(e) => {
                tracing::error!(
                    "{}: message {} dead-lettered after {} attempts: {}",
                    route.name(),
                    delivery.message.sequence,
                    delivery.attempts,
                    e
                );
                self.dead_letters.lock().push(DeadLetter { delivery, error: e });
                DeliveryStatus::DeadLettered
            }
        }
    }
}

/// Periodically drain the source ledger into the delivery queue until
/// shutdown is signalled
pub async fn run_poller<D: Datastore>(relayer: Relayer<D>, mut shutdown_rx: watch::Receiver<()>) {
    let mut poll_interval = tokio::time::interval(relayer.config.poll_interval());

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                if let Err(e) = relayer.poll_once().await {
                    tracing::error!("{}: poller stopping: {}", relayer.route.name(), e);
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                break;
            }
        }
    }

    tracing::info!("{}: poller shutting down", relayer.route.name());
}

/// Run the background worker delivering queued messages
///
/// # Example
///
/// ```ignore
/// let (relayer, receiver) = Relayer::new(route, config.relayer.clone());
///
/// tokio::spawn(run_poller(relayer.clone(), shutdown_rx.clone()));
/// tokio::spawn(run_worker(relayer, receiver.into_async(), shutdown_rx));
/// ```
pub async fn run_worker<D: Datastore>(
    relayer: Relayer<D>,
    mut delivery_stream: flume::r#async::RecvStream<'static, Delivery>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    tracing::info!("{}: starting delivery worker", relayer.route.name());

    loop {
        tokio::select! {
            Some(delivery) = delivery_stream.next() => {
                relayer.deliver(delivery).await;
            }

            _ = shutdown_rx.changed() => {
                break;
            }

            // Stream closed (all senders dropped)
            else => {
                tracing::info!("{}: delivery queue closed", relayer.route.name());
                break;
            }
        }
    }

    tracing::info!("{}: delivery worker shutting down", relayer.route.name());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::access_control::{RoleBitmap, Roles};
    use common::bridge::messages::{encode_renewal, encode_transfer_data};
    use common::bridge::RenewalSyncMessage;
    use common::clock::ManualClock;
    use common::ledger::LedgerConfig;
    use common::registry::{RegistryError, TransferData};
    use common::types::{LabelId, Timestamp};

    use super::*;

    const START: Timestamp = Timestamp(1_000);

    fn ledger(name: &str) -> (Ledger, LedgerConfig) {
        let config = LedgerConfig::derived(name, &["eth"]);
        let ledger = Ledger::in_memory(&config, Arc::new(ManualClock::new(START))).unwrap();
        (ledger, config)
    }

    fn relayer(config: RelayerConfig) -> (Relayer, DeliveryReceiver, LedgerConfig, LedgerConfig) {
        let (a, config_a) = ledger("a");
        let (b, config_b) = ledger("b");
        let route = Route {
            source: a,
            destination: b,
            transport: config_b.controller.transport,
        };
        let (relayer, receiver) = Relayer::new(route, config);
        (relayer, receiver, config_a, config_b)
    }

    fn eject_alice(ledger: &Ledger, config: &LedgerConfig) {
        let alice = Address::derive("alice");
        let roles = RoleBitmap::full(Roles::RENEW | Roles::SET_SUBREGISTRY | Roles::CAN_TRANSFER);
        let id = ledger
            .register(
                config.admin,
                TransferData::new("alice", alice, roles, START.saturating_add(100)),
            )
            .unwrap();
        let data = TransferData::new("alice", alice, roles, Timestamp(0));
        ledger
            .safe_transfer_from(
                alice,
                alice,
                config.controller.address,
                id,
                &encode_transfer_data(&data).unwrap(),
            )
            .unwrap();
    }

    fn delivery(payload: Vec<u8>) -> Delivery {
        Delivery {
            message: OutboundMessage {
                sequence: 0,
                kind: None,
                payload: payload.into(),
            },
            attempts: 0,
        }
    }

    #[tokio::test]
    async fn test_poll_and_deliver() {
        let (relayer, receiver, config_a, _) = relayer(RelayerConfig::default());
        eject_alice(&relayer.route().source, &config_a);

        assert_eq!(relayer.poll_once().await.unwrap(), 1);
        assert_eq!(relayer.route().source.outbound_len(), 0);

        let delivery = receiver.rx.recv_async().await.unwrap();
        let status = relayer.deliver(delivery).await;
        let id = relayer.route().destination.current_id("alice").unwrap();
        assert_eq!(status, DeliveryStatus::Delivered(IngressOutcome::Injected(id)));
        assert_eq!(
            relayer.route().destination.owner_of(id),
            Some(Address::derive("alice"))
        );
    }

    #[tokio::test]
    async fn test_closed_queue_leaves_messages_in_outbox() {
        let (relayer, receiver, config_a, _) = relayer(RelayerConfig::default());
        eject_alice(&relayer.route().source, &config_a);
        drop(receiver);

        assert!(matches!(
            relayer.poll_once().await,
            Err(RelayError::QueueClosed)
        ));
        let pending = relayer.route().source.take_outbound();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sequence, 0);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_dead_lettered() {
        let (relayer, _receiver, _, _) = relayer(RelayerConfig::default());

        let status = relayer.deliver(delivery(vec![1, 2, 3])).await;
        assert_eq!(status, DeliveryStatus::DeadLettered);

        let dead = relayer.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].delivery.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_is_requeued_then_dead_lettered() {
        let config = RelayerConfig {
            max_delivery_attempts: 2,
            retry_delay_ms: 10,
            ..Default::default()
        };
        let (relayer, receiver, _, _) = relayer(config);
        let label = LabelId::of("carol");
        let payload = encode_renewal(&RenewalSyncMessage::new(label, Timestamp(u64::MAX))).unwrap();

        let status = relayer.deliver(delivery(payload.to_vec())).await;
        assert_eq!(status, DeliveryStatus::Retrying { attempts: 1 });

        // the retry shows up after the delay
        let retried = receiver.rx.recv_async().await.unwrap();
        assert_eq!(retried.attempts, 1);

        let status = relayer.deliver(retried).await;
        assert_eq!(status, DeliveryStatus::DeadLettered);
        let dead = relayer.dead_letters();
        assert_eq!(
            dead[0].error,
            BridgeError::Registry(RegistryError::LabelNotFound(label))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_tasks_relay_until_shutdown() {
        let config = RelayerConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };
        let (relayer, receiver, config_a, _) = relayer(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let poller = tokio::spawn(run_poller(relayer.clone(), shutdown_rx.clone()));
        let worker = tokio::spawn(run_worker(
            relayer.clone(),
            receiver.into_async(),
            shutdown_rx,
        ));

        eject_alice(&relayer.route().source, &config_a);
        let destination = relayer.route().destination.clone();
        for _ in 0..100 {
            if destination.current_id("alice").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(destination.current_id("alice").is_some());

        shutdown_tx.send(()).unwrap();
        poller.await.unwrap();
        worker.await.unwrap();
    }
}
