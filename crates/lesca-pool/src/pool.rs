//! The browser instance pool itself.
//!
//! Entries live in a single `Mutex<Vec<Entry>>` rather than a lock-free
//! table: acquire/release both need to scan for an idle entry or compute
//! occupancy against `max_size`, and those checks must be atomic with the
//! mutation that follows them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use lesca_reliability::CircuitBreaker;
use lesca_types::{
    BrowserHandle, DestroyReason, LescaError, Launcher, MetricEvent, MetricsCollector,
    NullMetricsCollector, PoolHandle, Result,
};

use crate::config::PoolConfig;
use crate::stats::PoolStats;

struct Entry {
    id: u64,
    handle: Arc<dyn BrowserHandle>,
    in_use: bool,
    idle_since_ms: i64,
}

struct Inner {
    entries: Mutex<Vec<Entry>>,
    pending_creates: AtomicUsize,
    next_id: AtomicU64,
    notify: Notify,
    shutting_down: std::sync::atomic::AtomicBool,
    created: AtomicU64,
    destroyed: AtomicU64,
    reused: AtomicU64,
}

/// A bounded pool of browser instances for a single logical client.
pub struct BrowserPool {
    inner: Arc<Inner>,
    config: PoolConfig,
    launcher: Launcher,
    circuit: CircuitBreaker,
    metrics: Arc<dyn MetricsCollector>,
    session_name: Option<String>,
}

impl BrowserPool {
    pub fn new(config: PoolConfig, launcher: Launcher) -> Result<Arc<Self>> {
        Self::with_metrics(config, launcher, Arc::new(NullMetricsCollector), None)
    }

    pub fn with_metrics(
        config: PoolConfig,
        launcher: Launcher,
        metrics: Arc<dyn MetricsCollector>,
        session_name: Option<String>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let circuit = CircuitBreaker::new(config.circuit_breaker.clone());
        let pool = Arc::new(Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                pending_creates: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
                notify: Notify::new(),
                shutting_down: std::sync::atomic::AtomicBool::new(false),
                created: AtomicU64::new(0),
                destroyed: AtomicU64::new(0),
                reused: AtomicU64::new(0),
            }),
            config,
            launcher,
            circuit,
            metrics,
            session_name,
        });
        pool.clone().spawn_sweep();
        Ok(pool)
    }

    fn spawn_sweep(self: Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(&self);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else { break };
                pool.sweep_idle().await;
            }
        });
    }

    async fn sweep_idle(&self) {
        let now = lesca_utils::now_unix_millis();
        let idle_timeout_ms = self.config.idle_timeout.as_millis() as i64;
        let mut entries = self.inner.entries.lock().await;
        let mut remaining = entries.len();
        let min_size = self.config.min_size;

        let mut keep = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            let idle_long_enough = !entry.in_use && now - entry.idle_since_ms >= idle_timeout_ms;
            if idle_long_enough && remaining > min_size {
                debug!(entry_id = entry.id, "evicting idle browser instance");
                let _ = entry.handle.close().await;
                remaining -= 1;
                self.inner.destroyed.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .record(MetricEvent::PoolBrowserDestroyed {
                        timestamp: now,
                        reason: DestroyReason::Idle,
                        pool_size: remaining,
                        session_name: self.session_name.clone(),
                    })
                    .await;
            } else {
                keep.push(entry);
            }
        }
        *entries = keep;
        let deficit = min_size.saturating_sub(entries.len());
        drop(entries);

        for _ in 0..deficit {
            if let Some(Err(e)) = self.try_create().await {
                warn!(error = %e, "failed to refill pool to min_size");
                break;
            }
        }
    }

    /// Total entries plus reservations not yet materialized into an entry.
    fn occupancy(&self, entries_len: usize) -> usize {
        entries_len + self.inner.pending_creates.load(Ordering::Acquire)
    }

    /// Scans for an idle entry, evicting any that has disconnected along the
    /// way rather than handing out a dead handle.
    async fn try_reuse_idle(&self) -> Option<Arc<dyn BrowserHandle>> {
        loop {
            let mut entries = self.inner.entries.lock().await;
            let mut dead_index = None;
            for (i, entry) in entries.iter_mut().enumerate() {
                if entry.in_use {
                    continue;
                }
                if !entry.handle.is_connected().await {
                    dead_index = Some(i);
                    break;
                }
                entry.in_use = true;
                self.inner.reused.fetch_add(1, Ordering::Relaxed);
                return Some(entry.handle.clone());
            }
            match dead_index {
                Some(i) => {
                    let dead = entries.remove(i);
                    drop(entries);
                    debug!(entry_id = dead.id, "evicting disconnected idle instance");
                    let _ = dead.handle.close().await;
                    self.inner.destroyed.fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .record(MetricEvent::PoolBrowserDestroyed {
                            timestamp: lesca_utils::now_unix_millis(),
                            reason: DestroyReason::Disconnected,
                            pool_size: self.get_stats().await.total,
                            session_name: self.session_name.clone(),
                        })
                        .await;
                    // restart the scan, another idle entry may be usable
                }
                None => return None,
            }
        }
    }

    async fn try_create(&self) -> Option<Result<Arc<dyn BrowserHandle>>> {
        {
            let entries = self.inner.entries.lock().await;
            if self.occupancy(entries.len()) >= self.config.max_size {
                return None;
            }
            self.inner.pending_creates.fetch_add(1, Ordering::AcqRel);
        }

        let launcher = self.launcher.clone();
        let start = Instant::now();
        let result = self.circuit.execute(|| launcher()).await;
        self.inner.pending_creates.fetch_sub(1, Ordering::AcqRel);

        match result {
            Ok(handle) => {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let mut entries = self.inner.entries.lock().await;
                entries.push(Entry {
                    id,
                    handle: handle.clone(),
                    in_use: true,
                    idle_since_ms: lesca_utils::now_unix_millis(),
                });
                let pool_size = entries.len();
                drop(entries);
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .record(MetricEvent::PoolBrowserCreated {
                        timestamp: lesca_utils::now_unix_millis(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        pool_size,
                        session_name: self.session_name.clone(),
                    })
                    .await;
                Some(Ok(handle))
            }
            Err(e) => {
                warn!(error = %e, "browser launch failed");
                self.metrics
                    .record(MetricEvent::PoolFailure {
                        timestamp: lesca_utils::now_unix_millis(),
                        error: e.to_string(),
                        session_name: self.session_name.clone(),
                    })
                    .await;
                Some(Err(e))
            }
        }
    }

    pub async fn get_stats(&self) -> PoolStats {
        let entries = self.inner.entries.lock().await;
        let in_use = entries.iter().filter(|e| e.in_use).count();
        PoolStats {
            total: entries.len(),
            in_use,
            idle: entries.len() - in_use,
            pending_creates: self.inner.pending_creates.load(Ordering::Acquire),
            max_size: self.config.max_size,
            created: self.inner.created.load(Ordering::Relaxed),
            destroyed: self.inner.destroyed.load(Ordering::Relaxed),
            reused: self.inner.reused.load(Ordering::Relaxed),
        }
    }

    pub fn get_config(&self) -> &PoolConfig {
        &self.config
    }

    /// Closes every instance and marks the pool refusing new acquisitions.
    pub async fn drain(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        let mut entries = self.inner.entries.lock().await;
        for entry in entries.drain(..) {
            let _ = entry.handle.close().await;
            self.inner.destroyed.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .record(MetricEvent::PoolBrowserDestroyed {
                    timestamp: lesca_utils::now_unix_millis(),
                    reason: DestroyReason::Drain,
                    pool_size: 0,
                    session_name: self.session_name.clone(),
                })
                .await;
        }
        self.inner.notify.notify_waiters();
        info!(session_name = ?self.session_name, "pool drained");
    }
}

#[async_trait]
impl PoolHandle for BrowserPool {
    async fn acquire(&self) -> Result<Arc<dyn BrowserHandle>> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(LescaError::PoolShuttingDown {
                context: Default::default(),
            });
        }

        let start = Instant::now();
        let deadline = start + self.config.acquire_timeout;

        loop {
            if let Some(handle) = self.try_reuse_idle().await {
                self.metrics
                    .record(MetricEvent::PoolAcquire {
                        timestamp: lesca_utils::now_unix_millis(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        reused: true,
                        pool_size: self.get_stats().await.total,
                        session_name: self.session_name.clone(),
                    })
                    .await;
                return Ok(handle);
            }

            if let Some(result) = self.try_create().await {
                if result.is_ok() {
                    self.metrics
                        .record(MetricEvent::PoolAcquire {
                            timestamp: lesca_utils::now_unix_millis(),
                            duration_ms: start.elapsed().as_millis() as u64,
                            reused: false,
                            pool_size: self.get_stats().await.total,
                            session_name: self.session_name.clone(),
                        })
                        .await;
                }
                return result;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let stats = self.get_stats().await;
                self.metrics
                    .record(MetricEvent::PoolExhausted {
                        timestamp: lesca_utils::now_unix_millis(),
                        wait_ms: start.elapsed().as_millis() as u64,
                        pool_size: stats.total,
                        max_size: self.config.max_size,
                        session_name: self.session_name.clone(),
                    })
                    .await;
                return Err(LescaError::PoolExhausted {
                    timeout_ms: self.config.acquire_timeout.as_millis() as u64,
                    pool_size: stats.total,
                    max_size: self.config.max_size,
                    session_name: self.session_name.clone(),
                });
            }

            let _ = time::timeout(remaining, self.inner.notify.notified()).await;
        }
    }

    async fn release(&self, handle: Arc<dyn BrowserHandle>) {
        let mut entries = self.inner.entries.lock().await;
        let now = lesca_utils::now_unix_millis();
        let pool_size = entries.len();
        for entry in entries.iter_mut() {
            if Arc::ptr_eq(&entry.handle, &handle) {
                entry.in_use = false;
                entry.idle_since_ms = now;
                break;
            }
        }
        drop(entries);
        self.inner.notify.notify_one();
        self.metrics
            .record(MetricEvent::PoolRelease {
                timestamp: now,
                duration_ms: 0,
                pool_size,
                session_name: self.session_name.clone(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration as StdDuration;

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
            self.connected.store(false, Ordering::Relaxed);
            Ok(())
        }
        async fn contexts(&self) -> Result<Vec<Arc<dyn lesca_types::BrowserContext>>> {
            Ok(vec![])
        }
    }

    fn test_launcher() -> Launcher {
        Arc::new(|| {
            Box::pin(async {
                Ok(Arc::new(FakeHandle { connected: AtomicBool::new(true) }) as Arc<dyn BrowserHandle>)
            })
        })
    }

    #[tokio::test]
    async fn acquire_creates_up_to_max_size() {
        let config = PoolConfig { min_size: 0, max_size: 2, ..Default::default() };
        let pool = BrowserPool::new(config, test_launcher()).unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.get_stats().await.total, 2);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let config = PoolConfig {
            min_size: 0,
            max_size: 1,
            acquire_timeout: StdDuration::from_millis(50),
            ..Default::default()
        };
        let pool = BrowserPool::new(config, test_launcher()).unwrap();
        let _a = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, LescaError::PoolExhausted { .. }));
    }

    #[tokio::test]
    async fn release_makes_instance_reusable() {
        let config = PoolConfig { min_size: 0, max_size: 1, ..Default::default() };
        let pool = BrowserPool::new(config, test_launcher()).unwrap();
        let a = pool.acquire().await.unwrap();
        pool.release(a.clone()).await;
        let b = pool.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn disconnected_idle_entry_is_evicted_on_reuse_scan() {
        let config = PoolConfig { min_size: 0, max_size: 1, ..Default::default() };
        let pool = BrowserPool::new(config, test_launcher()).unwrap();

        let b1 = pool.acquire().await.unwrap();
        pool.release(b1.clone()).await;
        b1.close().await.unwrap();

        let b2 = pool.acquire().await.unwrap();
        assert!(!Arc::ptr_eq(&b1, &b2));

        let stats = pool.get_stats().await;
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn drain_closes_everything() {
        let config = PoolConfig { min_size: 0, max_size: 2, ..Default::default() };
        let pool = BrowserPool::new(config, test_launcher()).unwrap();
        let a = pool.acquire().await.unwrap();
        pool.release(a).await;
        pool.drain().await;
        assert_eq!(pool.get_stats().await.total, 0);
        assert!(matches!(
            pool.acquire().await.unwrap_err(),
            LescaError::PoolShuttingDown { .. }
        ));
    }
}
