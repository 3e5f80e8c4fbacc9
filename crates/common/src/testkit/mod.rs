/// Lightweight harness for tests spanning both ledgers
///
/// Builds two in-memory ledgers with manual clocks and relays their
/// outbound messages synchronously, so a whole ejection round trip runs
/// inside a plain `#[test]`.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::{Side, TestBridge};
///
/// #[test]
/// fn test_eject() -> anyhow::Result<()> {
///     let bridge = TestBridge::new()?;
///     let alice = bridge.account("alice");
///
///     bridge.register(Side::A, "alice", alice, 3600)?;
///     bridge.eject(Side::A, "alice", alice)?;
///     bridge.relay_all()?;
///
///     assert!(bridge.ledger(Side::B).current_id("alice").is_some());
///     Ok(())
/// }
/// ```
mod bridge;

pub use bridge::{Side, TestBridge, GENESIS};
