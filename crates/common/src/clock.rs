use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Timestamp;

/// Source of the current time for a ledger
///
/// Each ledger owns its own clock; there is no shared time across ledgers.
pub trait Clock: Send + Sync + std::fmt::Debug + 'static {
    fn now(&self) -> Timestamp;
}

/// Wall clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(chrono::Utc::now().timestamp().max(0) as u64)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the ledger holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start.as_secs())),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> Timestamp {
        let previous = self.now.fetch_add(secs, Ordering::SeqCst);
        Timestamp(previous + secs)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(Timestamp(100));
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now(), Timestamp(150));
        other.set(Timestamp(10));
        assert_eq!(clock.now(), Timestamp(10));
    }
}
