//! Lock-free circuit breaker guarding browser launches.
//!
//! State lives in atomics rather than behind a mutex so `execute` never
//! blocks a caller on another caller's bookkeeping. The half-open state
//! additionally gates concurrent probes through a single-permit semaphore:
//! only one in-flight launch gets to decide whether the circuit recloses.

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use lesca_types::LescaError;

use crate::clock::{Clock, RealClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in the closed state before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in the half-open state before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays open before allowing a half-open probe.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    opened_at_ms: AtomicI64,
    half_open_gate: Arc<Semaphore>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(RealClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at_ms: AtomicI64::new(0),
            half_open_gate: Arc::new(Semaphore::new(1)),
            config,
            clock,
        }
    }

    pub fn get_state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Forces the circuit closed and clears counters. Used by drain/shutdown
    /// paths that want a clean slate on the next start.
    pub fn reset(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        self.failure_count.store(0, Ordering::Release);
        self.success_count.store(0, Ordering::Release);
    }

    /// Forces the circuit open, as if `failure_threshold` had just been hit.
    pub fn trip(&self) {
        self.opened_at_ms.store(self.clock.now_ms(), Ordering::Release);
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.success_count.store(0, Ordering::Release);
    }

    fn remaining_open_ms(&self) -> i64 {
        let elapsed = self.clock.now_ms() - self.opened_at_ms.load(Ordering::Acquire);
        let budget = self.config.reset_timeout.as_millis() as i64;
        (budget - elapsed).max(0)
    }

    /// Runs `f` if the circuit admits a call, otherwise fails fast with
    /// [`LescaError::CircuitOpen`] without invoking `f` at all.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, LescaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LescaError>>,
    {
        match self.get_state() {
            CircuitState::Closed => self.run_closed(f).await,
            CircuitState::Open => self.try_transition_to_half_open(f).await,
            CircuitState::HalfOpen => self.run_half_open_probe(f).await,
        }
    }

    async fn run_closed<F, Fut, T>(&self, f: F) -> Result<T, LescaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LescaError>>,
    {
        match f().await {
            Ok(v) => {
                self.failure_count.store(0, Ordering::Release);
                Ok(v)
            }
            Err(e) => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.trip();
                }
                Err(e)
            }
        }
    }

    async fn try_transition_to_half_open<F, Fut, T>(&self, f: F) -> Result<T, LescaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LescaError>>,
    {
        let remaining = self.remaining_open_ms();
        if remaining > 0 {
            return Err(LescaError::CircuitOpen {
                failures: self.failure_count.load(Ordering::Acquire),
                reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
                remaining_ms: remaining as u64,
            });
        }
        // Only the caller that wins the CAS drives the closed->half-open move;
        // everyone else retries and lands in the HalfOpen branch instead.
        if self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.success_count.store(0, Ordering::Release);
        }
        self.run_half_open_probe(f).await
    }

    async fn run_half_open_probe<F, Fut, T>(&self, f: F) -> Result<T, LescaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LescaError>>,
    {
        let Ok(_permit) = self.half_open_gate.clone().try_acquire_owned() else {
            return Err(LescaError::CircuitOpen {
                failures: self.failure_count.load(Ordering::Acquire),
                reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
                remaining_ms: 0,
            });
        };

        match f().await {
            Ok(v) => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.reset();
                }
                Ok(v)
            }
            Err(e) => {
                self.trip();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(1000),
        }
    }

    fn failing() -> Result<(), LescaError> {
        Err(LescaError::LaunchFailed {
            message: "boom".into(),
            context: Default::default(),
            cause: None,
        })
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(config());
        assert!(cb.execute(|| async { failing() }).await.is_err());
        assert_eq!(cb.get_state(), CircuitState::Closed);
        assert!(cb.execute(|| async { failing() }).await.is_err());
        assert_eq!(cb.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn fails_fast_while_open() {
        let cb = CircuitBreaker::new(config());
        cb.trip();
        let result = cb.execute(|| async { Ok::<_, LescaError>(()) }).await;
        assert!(matches!(result, Err(LescaError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn recloses_after_success_threshold_in_half_open() {
        let clock = crate::clock::TestClock::new(0);
        let cb = CircuitBreaker::with_clock(config(), clock.clone());
        cb.trip();
        clock.advance(2000);

        cb.execute(|| async { Ok::<_, LescaError>(()) }).await.unwrap();
        assert_eq!(cb.get_state(), CircuitState::HalfOpen);
        cb.execute(|| async { Ok::<_, LescaError>(()) }).await.unwrap();
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn reopens_on_half_open_failure() {
        let clock = crate::clock::TestClock::new(0);
        let cb = CircuitBreaker::with_clock(config(), clock.clone());
        cb.trip();
        clock.advance(2000);

        let result = cb.execute(|| async { failing() }).await;
        assert!(result.is_err());
        assert_eq!(cb.get_state(), CircuitState::Open);
    }
}
