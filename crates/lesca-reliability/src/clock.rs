//! Clock abstraction so the circuit breaker's timeout logic is deterministic
//! under test.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A source of monotonic-enough wall time, in milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now_ms(&self) -> i64 {
        lesca_utils::now_unix_millis()
    }
}

/// A clock the test suite can advance by hand.
#[derive(Debug)]
pub struct TestClock {
    millis: AtomicI64,
}

impl TestClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self { millis: AtomicI64::new(start_ms) })
    }

    pub fn advance(&self, delta_ms: i64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.millis.store(ms, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
