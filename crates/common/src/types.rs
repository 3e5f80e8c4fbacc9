//! Identifiers shared by every component
//!
//! - [`Address`]: an account, registry or controller identity
//! - [`LabelId`]: BLAKE3 hash of a single label, shared by both ledgers
//! - [`NameId`]: a registration of a label, `(label, generation)`
//! - [`Resource`]: the scope a role is granted at
//! - [`Timestamp`]: seconds since the unix epoch

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of an address in bytes
pub const ADDRESS_SIZE: usize = 20;
/// Size of a label hash in bytes
pub const LABEL_ID_SIZE: usize = 32;
/// Longest label accepted by a registry, in bytes
pub const MAX_LABEL_LENGTH: usize = 255;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address hex: {0}")]
    InvalidHex(String),
    #[error("invalid address size, expected {ADDRESS_SIZE}, got {0}")]
    InvalidSize(usize),
}

/// An account identity on a ledger.
///
/// The zero address is never a valid owner; registries and the bridge
/// treat it as "nobody".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_SIZE]);

    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random address, mostly useful for tests and devnets
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Derive a stable address from a human readable seed
    pub fn derive(seed: &str) -> Self {
        let hash = blake3::hash(seed.as_bytes());
        let mut buff = [0; ADDRESS_SIZE];
        buff.copy_from_slice(&hash.as_bytes()[..ADDRESS_SIZE]);
        Self(buff)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Parse an address from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, AddressError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != ADDRESS_SIZE * 2 {
            return Err(AddressError::InvalidSize(hex.len() / 2));
        }
        let mut buff = [0; ADDRESS_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(buff))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// hex strings in config files, raw bytes on the wire
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let hex = String::deserialize(deserializer)?;
            Self::from_hex(&hex).map_err(serde::de::Error::custom)
        } else {
            <[u8; ADDRESS_SIZE]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Registries are identified by their own address
pub type RegistryId = Address;

/// Hash of a single label. Both ledgers derive the same id for the same
/// label, which makes it the only identifier safe to put on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId([u8; LABEL_ID_SIZE]);

impl LabelId {
    pub fn of(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; LABEL_ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first 8 bytes are plenty for logs
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelId({})", self)
    }
}

/// One registration of a label on one ledger.
///
/// Every registration of a label gets the next generation, so a name that
/// is burned and registered again never shares a [`Resource`] with any of
/// its previous registrations. This id doubles as the name's token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameId {
    pub label: LabelId,
    pub generation: u32,
}

impl NameId {
    pub fn new(label: LabelId, generation: u32) -> Self {
        Self { label, generation }
    }

    pub fn resource(&self) -> Resource {
        Resource::Name(*self)
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.generation)
    }
}

/// The scope at which roles are held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    /// Global / administrative scope
    Root,
    /// A single registration of a name
    Name(NameId),
}

impl Resource {
    pub const ROOT: Resource = Resource::Root;

    pub fn is_root(&self) -> bool {
        matches!(self, Resource::Root)
    }
}

impl From<NameId> for Resource {
    fn from(id: NameId) -> Self {
        Resource::Name(id)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Root => write!(f, "root"),
            Resource::Name(id) => write!(f, "{}", id),
        }
    }
}

/// Seconds since the unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a label can be registered as a single name segment
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.len() <= MAX_LABEL_LENGTH && !label.contains('.')
}
