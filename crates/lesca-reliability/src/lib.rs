//! Fault tolerance for the browser pool: a lock-free circuit breaker guarding
//! launches, plus a parser for driver/server `Retry-After` hints.

pub mod circuit_breaker;
pub mod clock;
pub mod retry_after;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, RealClock};
pub use retry_after::parse_retry_after;
