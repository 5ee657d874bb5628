//! A small builder over `std::env`, so config can be assembled with
//! sensible defaults and still be overridden per-deployment.

use std::time::Duration;

use lesca_manager::SessionPoolManagerConfig;
use lesca_pool::PoolConfig;
use lesca_reliability::CircuitBreakerConfig;
use lesca_types::LescaError;

/// Reads `LESCA_*` environment variables into typed config values, falling
/// back to the given default whenever a variable is absent or unparsable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigLoader;

impl EnvConfigLoader {
    pub fn new() -> Self {
        Self
    }

    fn get<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn pool_config(&self) -> Result<PoolConfig, LescaError> {
        let config = PoolConfig {
            min_size: self.get("LESCA_POOL_MIN_SIZE", 1),
            max_size: self.get("LESCA_POOL_MAX_SIZE", 5),
            acquire_timeout: Duration::from_millis(self.get("LESCA_POOL_ACQUIRE_TIMEOUT_MS", 30_000)),
            idle_timeout: Duration::from_millis(self.get("LESCA_POOL_IDLE_TIMEOUT_MS", 300_000)),
            sweep_interval: Duration::from_millis(self.get("LESCA_POOL_SWEEP_INTERVAL_MS", 60_000)),
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.get("LESCA_CIRCUIT_FAILURE_THRESHOLD", 5),
                success_threshold: self.get("LESCA_CIRCUIT_SUCCESS_THRESHOLD", 2),
                reset_timeout: Duration::from_millis(self.get("LESCA_CIRCUIT_RESET_TIMEOUT_MS", 30_000)),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn manager_config(&self) -> Result<SessionPoolManagerConfig, LescaError> {
        let config = SessionPoolManagerConfig {
            retry_on_failure: self.get("LESCA_MANAGER_RETRY_ON_FAILURE", true),
            max_retries: self.get("LESCA_MANAGER_MAX_RETRIES", 2),
            retry_base_ms: self.get("LESCA_MANAGER_RETRY_BASE_MS", 1000),
            acquire_timeout_ms: self.get("LESCA_MANAGER_ACQUIRE_TIMEOUT_MS", 30_000),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn service_config(&self) -> crate::service::ServiceConfig {
        crate::service::ServiceConfig {
            session_dir: self.get("LESCA_SESSION_DIR", "./lesca-sessions".to_string()),
            auto_restore: self.get("LESCA_AUTO_RESTORE", true),
            persist_on_shutdown: self.get("LESCA_PERSIST_ON_SHUTDOWN", true),
            pooling_enabled: self.get("LESCA_POOLING_ENABLED", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        std::env::remove_var("LESCA_POOL_MAX_SIZE");
        let loader = EnvConfigLoader::new();
        let config = loader.pool_config().unwrap();
        assert_eq!(config.max_size, 5);
    }

    #[test]
    fn env_override_wins() {
        std::env::set_var("LESCA_POOL_MAX_SIZE", "9");
        let loader = EnvConfigLoader::new();
        let config = loader.pool_config().unwrap();
        assert_eq!(config.max_size, 9);
        std::env::remove_var("LESCA_POOL_MAX_SIZE");
    }
}
