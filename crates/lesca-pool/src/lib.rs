//! A bounded pool of browser instances, launched through a circuit breaker
//! and reaped by an idle-eviction sweep.

pub mod config;
pub mod pool;
pub mod stats;

pub use config::PoolConfig;
pub use pool::BrowserPool;
pub use stats::PoolStats;
