//! Wire format for everything that crosses the bridge.
//!
//! Payloads are bincode with fixed-width little-endian integers, so the
//! first four bytes of every [`BridgeMessage`] are its variant index as a
//! `u32`. [`peek_type`] relies on that to dispatch without decoding the
//! rest. Trailing bytes are rejected and decoding is bounded by
//! [`MAX_MESSAGE_SIZE`]; a decode either yields the whole message or fails.

mod ejection;
mod renewal;

use std::fmt;

use bincode::Options;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::registry::TransferData;

pub use ejection::EjectionMessage;
pub use renewal::RenewalSyncMessage;

/// Upper bound on an encoded payload, in bytes
pub const MAX_MESSAGE_SIZE: u64 = 64 * 1024;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("unexpected message type: expected {expected}, found {found}")]
    UnexpectedType {
        expected: MessageType,
        found: MessageType,
    },
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Discriminant of a [`BridgeMessage`], as found in a payload's first four bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Ejection,
    RenewalSync,
}

impl MessageType {
    fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Ejection),
            1 => Some(Self::RenewalSync),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Ejection => write!(f, "ejection"),
            MessageType::RenewalSync => write!(f, "renewal-sync"),
        }
    }
}

/// Top-level message exchanged between bridge controllers.
///
/// Variant order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeMessage {
    /// A name leaving the sending ledger
    Ejection(EjectionMessage),
    /// A new expiry for a name that was ejected from the receiving ledger
    RenewalSync(RenewalSyncMessage),
}

impl BridgeMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            BridgeMessage::Ejection(_) => MessageType::Ejection,
            BridgeMessage::RenewalSync(_) => MessageType::RenewalSync,
        }
    }

    pub fn encode(&self) -> Result<Bytes, CodecError> {
        encode(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        // reject unknown tags with our own error before bincode does
        peek_type(payload)?;
        decode(payload)
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_MESSAGE_SIZE)
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes, CodecError> {
    options()
        .serialize(value)
        .map(Bytes::from)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(payload)
        .map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Read the message type from the first four bytes of a payload
pub fn peek_type(payload: &[u8]) -> Result<MessageType, CodecError> {
    let Some(tag) = payload.get(..4) else {
        return Err(CodecError::Malformed(format!(
            "payload of {} bytes is too short for a message type",
            payload.len()
        )));
    };
    let tag = u32::from_le_bytes([tag[0], tag[1], tag[2], tag[3]]);
    MessageType::from_tag(tag)
        .ok_or_else(|| CodecError::Malformed(format!("unknown message type {}", tag)))
}

fn expect_type(payload: &[u8], expected: MessageType) -> Result<(), CodecError> {
    let found = peek_type(payload)?;
    if found != expected {
        return Err(CodecError::UnexpectedType { expected, found });
    }
    Ok(())
}

pub fn encode_ejection(message: &EjectionMessage) -> Result<Bytes, CodecError> {
    encode(&BridgeMessage::Ejection(message.clone()))
}

pub fn decode_ejection(payload: &[u8]) -> Result<EjectionMessage, CodecError> {
    expect_type(payload, MessageType::Ejection)?;
    match decode(payload)? {
        BridgeMessage::Ejection(message) => {
            tracing::debug!("decoded ejection of {:?}", message.name);
            Ok(message)
        }
        other => Err(CodecError::UnexpectedType {
            expected: MessageType::Ejection,
            found: other.message_type(),
        }),
    }
}

pub fn encode_renewal(message: &RenewalSyncMessage) -> Result<Bytes, CodecError> {
    encode(&BridgeMessage::RenewalSync(*message))
}

pub fn decode_renewal(payload: &[u8]) -> Result<RenewalSyncMessage, CodecError> {
    expect_type(payload, MessageType::RenewalSync)?;
    match decode(payload)? {
        BridgeMessage::RenewalSync(message) => {
            tracing::debug!("decoded renewal sync for {}", message.label);
            Ok(message)
        }
        other => Err(CodecError::UnexpectedType {
            expected: MessageType::RenewalSync,
            found: other.message_type(),
        }),
    }
}

/// Encode the data attached to a single token transfer
pub fn encode_transfer_data(data: &TransferData) -> Result<Bytes, CodecError> {
    encode(data)
}

pub fn decode_transfer_data(payload: &[u8]) -> Result<TransferData, CodecError> {
    decode(payload)
}

/// Encode the data attached to a batch token transfer, one item per token
pub fn encode_transfer_batch(batch: &[TransferData]) -> Result<Bytes, CodecError> {
    encode(&batch)
}

pub fn decode_transfer_batch(payload: &[u8]) -> Result<Vec<TransferData>, CodecError> {
    decode(payload)
}
