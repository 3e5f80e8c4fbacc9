use std::collections::VecDeque;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::messages::{peek_type, MessageType};
use crate::access_control::RoleBitmap;
use crate::types::Address;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("outbound queue is full ({capacity} messages)")]
    QueueFull { capacity: usize },
    #[error("{caller} may not deliver bridge messages, missing {missing}")]
    UnauthorizedCaller { caller: Address, missing: RoleBitmap },
}

/// Outbound side of the messaging layer between two ledgers.
///
/// Delivery is at-least-once and unordered. Sending happens inside the
/// ejecting transaction, so a failed send reverts the ejection.
pub trait BridgeTransport: Send + Sync + std::fmt::Debug {
    /// Queue a payload for the counterpart ledger
    ///
    /// # Returns
    /// * `Ok(u64)` - the sequence number assigned to the message
    /// * `Err(TransportError)` - the message was not queued
    fn send_message(&mut self, payload: Bytes) -> Result<u64, TransportError>;
}

/// A payload waiting to be relayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub sequence: u64,
    /// `None` when the payload does not start with a known message type
    pub kind: Option<MessageType>,
    pub payload: Bytes,
}

/// The ledger-local end of the transport: an in-memory queue a relayer
/// drains and delivers to the other ledger.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    next_sequence: u64,
    capacity: Option<usize>,
    queue: VecDeque<OutboundMessage>,
}

impl Outbox {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued message, oldest first
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        self.queue.drain(..).collect()
    }

    /// Put messages taken by [`drain`](Self::drain) back at the front of
    /// the queue, keeping their order and sequence numbers. Capacity is not
    /// checked; the messages were already queued once.
    pub fn restore(&mut self, messages: Vec<OutboundMessage>) {
        for message in messages.into_iter().rev() {
            self.queue.push_front(message);
        }
    }
}

impl BridgeTransport for Outbox {
    fn send_message(&mut self, payload: Bytes) -> Result<u64, TransportError> {
        if let Some(capacity) = self.capacity {
            if self.queue.len() >= capacity {
                return Err(TransportError::QueueFull { capacity });
            }
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let kind = peek_type(&payload).ok();
        tracing::debug!("queued message {} ({:?}, {} bytes)", sequence, kind, payload.len());
        self.queue.push_back(OutboundMessage {
            sequence,
            kind,
            payload,
        });
        Ok(sequence)
    }
}
