//! Service infrastructure for running a pair of bridged ledgers.
//!
//! This crate provides the components used by the relay binary:
//! - Configuration (TOML, with defaults for everything but the ledgers)
//! - State management (both ledgers built from config)
//! - Relayer (background delivery queue between the ledgers)
//! - Demo (a scripted round trip of one name, for devnets)

pub mod config;
pub mod demo;
pub mod relayer;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, ConfigError, RelayerConfig};
pub use demo::{run_demo, DemoError, DemoReport};
pub use relayer::{run_poller, run_worker, DeadLetter, Delivery, DeliveryReceiver, Relayer, Route};
pub use state::{State as ServiceState, StateSetupError};
