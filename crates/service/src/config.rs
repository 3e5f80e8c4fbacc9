use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::ledger::LedgerConfig;

pub const CONFIG_FILE_NAME: &str = "namebridge.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub relayer: RelayerConfig,
    pub ledger_a: LedgerConfig,
    pub ledger_b: LedgerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// How often each ledger's outbound queue is drained
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of deliveries waiting for the worker. None means
    ///  unbounded.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: Option<usize>,
    /// Attempts per message before it is dead-lettered
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
    /// Wait between attempts of a retryable delivery
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_queue_size() -> Option<usize> {
    // keep a stalled destination from growing memory without bound
    Some(1000)
}

fn default_max_delivery_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_queue_size: default_max_queue_size(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RelayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// A two-ledger devnet serving `.eth`, with every address derived from
    /// the ledger names
    pub fn devnet() -> Self {
        Self {
            log_level: default_log_level(),
            relayer: RelayerConfig::default(),
            ledger_a: LedgerConfig::derived("a", &["eth"]),
            ledger_b: LedgerConfig::derived("b", &["eth"]),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_toml = std::fs::read_to_string(path)?;
        Self::from_toml(&config_toml)
    }

    pub fn from_toml(config_toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Both ledgers must serve the same parent name through distinct
    /// controllers, or ejected names could never be injected
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger_a.parent != self.ledger_b.parent {
            return Err(ConfigError::Invalid(format!(
                "ledgers serve different parents: {:?} and {:?}",
                self.ledger_a.parent, self.ledger_b.parent
            )));
        }
        for ledger in [&self.ledger_a, &self.ledger_b] {
            let controller = &ledger.controller;
            if controller.address.is_zero() || controller.transport.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "ledger {} has a zero controller or transport address",
                    ledger.name
                )));
            }
        }
        if self.relayer.max_delivery_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_delivery_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
