//! Maps session names to their own [`BrowserPool`], created lazily on first
//! acquisition and retried with linear backoff on contention.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::warn;

use lesca_pool::{BrowserPool, PoolConfig, PoolStats};
use lesca_types::{
    BrowserHandle, Launcher, LescaError, MetricsCollector, NullMetricsCollector, PoolHandle,
    Result,
};

#[derive(Debug, Clone, Copy)]
pub struct SessionPoolManagerConfig {
    /// Whether a failed/timed-out attempt is retried at all.
    pub retry_on_failure: bool,
    /// Additional attempts made after the first, when `retry_on_failure`.
    pub max_retries: u32,
    /// Backoff for attempt `n` is `n * retry_base_ms` -- linear, not
    /// exponential: a session pool that's merely busy should free up in
    /// roughly bounded time, not be backed off into minutes.
    pub retry_base_ms: u64,
    /// Upper bound on a single acquire attempt, independent of the
    /// underlying pool's own `acquire_timeout`.
    pub acquire_timeout_ms: u64,
}

impl Default for SessionPoolManagerConfig {
    fn default() -> Self {
        Self { retry_on_failure: true, max_retries: 2, retry_base_ms: 1000, acquire_timeout_ms: 30_000 }
    }
}

impl SessionPoolManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.acquire_timeout_ms < 1000 {
            return Err(LescaError::invalid_config("acquire_timeout_ms", "must be at least 1000"));
        }
        Ok(())
    }

    fn attempts(&self) -> u32 {
        if self.retry_on_failure { self.max_retries + 1 } else { 1 }
    }
}

pub struct SessionPoolManager {
    pools: RwLock<HashMap<String, Arc<BrowserPool>>>,
    pool_config: PoolConfig,
    launcher_factory: Arc<dyn Fn(&str) -> Launcher + Send + Sync>,
    metrics: Arc<dyn MetricsCollector>,
    config: SessionPoolManagerConfig,
}

impl SessionPoolManager {
    pub fn new(
        pool_config: PoolConfig,
        launcher_factory: Arc<dyn Fn(&str) -> Launcher + Send + Sync>,
        config: SessionPoolManagerConfig,
    ) -> Result<Self> {
        pool_config.validate()?;
        config.validate()?;
        Ok(Self {
            pools: RwLock::new(HashMap::new()),
            pool_config,
            launcher_factory,
            metrics: Arc::new(NullMetricsCollector),
            config,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn pool_for(&self, session_name: &str) -> Result<Arc<BrowserPool>> {
        if let Some(pool) = self.pools.read().await.get(session_name) {
            return Ok(pool.clone());
        }
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(session_name) {
            return Ok(pool.clone());
        }
        let launcher = (self.launcher_factory)(session_name);
        let pool = BrowserPool::with_metrics(
            self.pool_config.clone(),
            launcher,
            self.metrics.clone(),
            Some(session_name.to_string()),
        )?;
        pools.insert(session_name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Acquires from `session_name`'s pool, retrying with linear backoff on
    /// exhaustion or a tripped circuit.
    pub async fn acquire(&self, session_name: &str) -> Result<Arc<dyn BrowserHandle>> {
        let pool = self.pool_for(session_name).await?;
        let attempts = self.config.attempts();
        let mut last_err = None;
        let timeout = std::time::Duration::from_millis(self.config.acquire_timeout_ms);

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, pool.acquire()).await {
                Ok(Ok(handle)) => return Ok(handle),
                Ok(Err(e @ (LescaError::PoolExhausted { .. } | LescaError::CircuitOpen { .. }))) => {
                    warn!(session_name, attempt, error = %e, "acquire attempt failed, retrying");
                    last_err = Some(e.to_string());
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {
                    warn!(session_name, attempt, timeout_ms = self.config.acquire_timeout_ms, "acquire attempt timed out, retrying");
                    last_err = Some(format!("acquire timed out after {}ms", self.config.acquire_timeout_ms));
                }
            }
            if attempt < attempts {
                sleep(std::time::Duration::from_millis(attempt as u64 * self.config.retry_base_ms)).await;
            }
        }

        Err(LescaError::AcquireFailed {
            session_name: session_name.to_string(),
            message: last_err.unwrap_or_default(),
            context: Default::default(),
            cause: None,
        })
    }

    pub async fn release(&self, session_name: &str, handle: Arc<dyn BrowserHandle>) {
        if let Some(pool) = self.pools.read().await.get(session_name) {
            pool.release(handle).await;
        }
    }

    pub async fn stats_for(&self, session_name: &str) -> Option<PoolStats> {
        let pool = self.pools.read().await.get(session_name)?.clone();
        Some(pool.get_stats().await)
    }

    pub async fn drain_session(&self, session_name: &str) {
        if let Some(pool) = self.pools.write().await.remove(session_name) {
            pool.drain().await;
        }
    }

    pub async fn drain_all(&self) {
        let pools: Vec<_> = self.pools.write().await.drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.drain().await;
        }
    }

    /// A handle bound to one session, satisfying [`PoolHandle`] without
    /// every caller threading the session name through.
    pub fn handle_for(self: &Arc<Self>, session_name: impl Into<String>) -> SessionBoundHandle {
        SessionBoundHandle { manager: self.clone(), session_name: session_name.into() }
    }
}

pub struct SessionBoundHandle {
    manager: Arc<SessionPoolManager>,
    session_name: String,
}

#[async_trait]
impl PoolHandle for SessionBoundHandle {
    async fn acquire(&self) -> Result<Arc<dyn BrowserHandle>> {
        self.manager.acquire(&self.session_name).await
    }

    async fn release(&self, handle: Arc<dyn BrowserHandle>) {
        self.manager.release(&self.session_name, handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct FakeHandle {
        connected: AtomicBool,
    }

    #[async_trait]
    impl BrowserHandle for FakeHandle {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        async fn contexts(&self) -> Result<Vec<Arc<dyn lesca_types::BrowserContext>>> {
            Ok(vec![])
        }
    }

    fn fake_launcher() -> Launcher {
        Arc::new(|| {
            Box::pin(async {
                Ok(Arc::new(FakeHandle { connected: AtomicBool::new(true) }) as Arc<dyn BrowserHandle>)
            })
        })
    }

    fn factory() -> Arc<dyn Fn(&str) -> Launcher + Send + Sync> {
        Arc::new(|_name: &str| fake_launcher())
    }

    #[tokio::test]
    async fn separate_sessions_get_separate_pools() {
        let manager = SessionPoolManager::new(
            PoolConfig { min_size: 0, max_size: 1, ..Default::default() },
            factory(),
            SessionPoolManagerConfig::default(),
        )
        .unwrap();

        let a = manager.acquire("alice").await.unwrap();
        let b = manager.acquire("bob").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(manager.stats_for("alice").await.unwrap().total, 1);
        assert_eq!(manager.stats_for("bob").await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn retries_then_fails_when_exhausted() {
        let manager = SessionPoolManager::new(
            PoolConfig {
                min_size: 0,
                max_size: 1,
                acquire_timeout: std::time::Duration::from_millis(10),
                ..Default::default()
            },
            factory(),
            SessionPoolManagerConfig {
                retry_on_failure: true,
                max_retries: 1,
                retry_base_ms: 5,
                acquire_timeout_ms: 1000,
            },
        )
        .unwrap();

        let _held = manager.acquire("alice").await.unwrap();
        let err = manager.acquire("alice").await.unwrap_err();
        assert!(matches!(err, LescaError::AcquireFailed { .. }));
    }

    #[tokio::test]
    async fn drain_session_removes_its_pool() {
        let manager = Arc::new(
            SessionPoolManager::new(
                PoolConfig { min_size: 0, max_size: 1, ..Default::default() },
                factory(),
                SessionPoolManagerConfig::default(),
            )
            .unwrap(),
        );
        let handle = manager.handle_for("alice");
        let h = handle.acquire().await.unwrap();
        handle.release(h).await;
        manager.drain_session("alice").await;
        assert!(manager.stats_for("alice").await.is_none());
    }
}
