//! Shared test utilities for bridge integration tests
#![allow(dead_code)]

use ::common::testkit::{Side, TestBridge};
use ::common::types::{Address, NameId};

pub const YEAR: u64 = 365 * 24 * 60 * 60;

/// Install a tracing subscriber once, honouring RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A bridge with "alice" registered to the alice account on ledger A
pub fn bridge_with_alice() -> (TestBridge, Address, NameId) {
    init_tracing();
    let bridge = TestBridge::new().unwrap();
    let alice = bridge.account("alice");
    let id = bridge.register(Side::A, "alice", alice, YEAR).unwrap();
    (bridge, alice, id)
}
