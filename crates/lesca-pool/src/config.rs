//! Pool sizing and timing knobs.

use std::time::Duration;

use lesca_reliability::CircuitBreakerConfig;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Instances kept warm even when idle; the eviction sweep never reaps
    /// below this floor.
    pub min_size: usize,
    /// Hard ceiling on concurrently held instances, including ones mid-create.
    pub max_size: usize,
    /// How long `acquire` waits for a free or newly created instance before
    /// failing with `PoolExhausted`.
    pub acquire_timeout: Duration,
    /// How long an instance may sit unused before the sweep destroys it
    /// (subject to `min_size`).
    pub idle_timeout: Duration,
    /// Interval between idle-eviction sweeps.
    pub sweep_interval: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), lesca_types::LescaError> {
        if self.max_size == 0 {
            return Err(lesca_types::LescaError::invalid_config(
                "max_size",
                "must be at least 1",
            ));
        }
        if self.min_size > self.max_size {
            return Err(lesca_types::LescaError::invalid_config(
                "min_size",
                "must not exceed max_size",
            ));
        }
        Ok(())
    }
}
