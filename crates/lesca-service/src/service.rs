//! Orchestrates the manager, session store and metrics bus behind a single
//! idempotent startup/shutdown lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use lesca_config::ServiceConfig;
use lesca_manager::SessionPoolManager;
use lesca_metrics::MetricsBus;
use lesca_session::SessionStore;
use lesca_types::{BrowserHandle, LescaError, MetricsCollector, Result};

pub struct BrowserService {
    config: ServiceConfig,
    manager: Arc<SessionPoolManager>,
    store: SessionStore,
    metrics: Arc<MetricsBus>,
    started: AtomicBool,
    active: RwLock<HashMap<String, Arc<dyn BrowserHandle>>>,
}

impl BrowserService {
    pub fn new(config: ServiceConfig, manager: Arc<SessionPoolManager>, metrics: Arc<MetricsBus>) -> Self {
        let store = SessionStore::new(config.session_dir.clone());
        Self {
            config,
            manager,
            store,
            metrics,
            started: AtomicBool::new(false),
            active: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_pooling_enabled(&self) -> bool {
        self.config.pooling_enabled
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Brings the service up. A second call while already started is a
    /// no-op, not an error: callers don't need to track whether they're
    /// the one who started it.
    pub async fn startup(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if self.config.auto_restore {
            match self.store.cleanup_expired().await {
                Ok(removed) if !removed.is_empty() => {
                    info!(count = removed.len(), "pruned expired sessions on startup");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "session cleanup failed during startup"),
            }
        }

        info!("browser service started");
        Ok(())
    }

    fn require_started(&self) -> Result<()> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(LescaError::NotStarted)
        }
    }

    /// Acquires a browser handle bound to `session_name`, tracking it so
    /// `shutdown` can snapshot its state.
    pub async fn acquire_session(&self, session_name: &str) -> Result<Arc<dyn BrowserHandle>> {
        self.require_started()?;
        if !self.store.exists(session_name).await {
            self.store.create(session_name).await?;
        }
        let handle = self.manager.acquire(session_name).await?;

        if self.config.auto_restore {
            match handle.contexts().await {
                Ok(contexts) => {
                    if let Some(context) = contexts.first() {
                        if let Err(e) = self.store.restore_into(session_name, context).await {
                            warn!(session_name, error = %e, "failed to restore saved session");
                        }
                    }
                }
                Err(e) => debug!(session_name, error = %e, "handle exposed no contexts to restore into"),
            }
        }

        self.active.write().await.insert(session_name.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn release_session(&self, session_name: &str, handle: Arc<dyn BrowserHandle>) {
        self.manager.release(session_name, handle).await;
    }

    /// Spawns a task that calls `shutdown()` on SIGINT/SIGTERM, so a process
    /// killed from outside still persists and drains. The returned task
    /// does not keep the process alive on its own.
    pub fn spawn_shutdown_hook(self: &Arc<Self>) {
        let service = self.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, draining");
            if let Err(e) = service.shutdown().await {
                warn!(error = %e, "shutdown triggered by signal failed");
            }
        });
    }

    /// Idempotent shutdown: persists every tracked session's state (if
    /// configured), drains every pool, then marks the service stopped so a
    /// repeat call is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if self.config.persist_on_shutdown {
            let active = self.active.write().await.drain().collect::<Vec<_>>();
            for (session_name, handle) in active {
                if let Err(e) = self.snapshot_into_store(&session_name, &handle).await {
                    warn!(session_name, error = %e, "failed to persist session on shutdown");
                }
            }
        }

        self.manager.drain_all().await;
        info!("browser service stopped");
        Ok(())
    }

    async fn snapshot_into_store(&self, session_name: &str, handle: &Arc<dyn BrowserHandle>) -> Result<()> {
        let contexts = handle.contexts().await?;
        let Some(context) = contexts.first() else {
            return Ok(());
        };
        self.store.snapshot(session_name, context, Some("Persisted on shutdown".to_string())).await?;
        self.metrics.record(lesca_types::MetricEvent::PoolRelease {
            timestamp: lesca_utils::now_unix_millis(),
            duration_ms: 0,
            pool_size: 0,
            session_name: Some(session_name.to_string()),
        }).await;
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lesca_pool::PoolConfig;
    use lesca_types::{Cookie, Launcher};
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    #[derive(Debug)]
    struct FakeContext;

    #[async_trait]
    impl lesca_types::BrowserContext for FakeContext {
        async fn cookies(&self) -> Result<Vec<Cookie>> {
            Ok(vec![Cookie {
                name: "session".into(),
                value: "abc".into(),
                domain: "example.com".into(),
                path: "/".into(),
                expires: -1,
                http_only: true,
                secure: true,
                same_site: None,
            }])
        }
        async fn add_cookies(&self, _cookies: Vec<Cookie>) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&self, _script: &str) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
    }

    #[derive(Debug)]
    struct FakeHandle {
        connected: StdAtomicBool,
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
            Ok(vec![Arc::new(FakeContext)])
        }
    }

    fn fake_launcher() -> Launcher {
        Arc::new(|| {
            Box::pin(async {
                Ok(Arc::new(FakeHandle { connected: StdAtomicBool::new(true) }) as Arc<dyn BrowserHandle>)
            })
        })
    }

    fn factory() -> Arc<dyn Fn(&str) -> Launcher + Send + Sync> {
        Arc::new(|_name: &str| fake_launcher())
    }

    fn service(dir: &std::path::Path) -> BrowserService {
        let manager = Arc::new(
            SessionPoolManager::new(
                PoolConfig { min_size: 0, max_size: 1, ..Default::default() },
                factory(),
                Default::default(),
            )
            .unwrap(),
        );
        BrowserService::new(
            ServiceConfig { session_dir: dir.to_string_lossy().to_string(), ..Default::default() },
            manager,
            Arc::new(MetricsBus::new()),
        )
    }

    #[tokio::test]
    async fn acquire_before_startup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        assert!(matches!(
            svc.acquire_session("alice").await.unwrap_err(),
            LescaError::NotStarted
        ));
    }

    #[tokio::test]
    async fn startup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.startup().await.unwrap();
        svc.startup().await.unwrap();
        assert!(svc.is_started());
    }

    #[tokio::test]
    async fn shutdown_persists_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.startup().await.unwrap();
        let handle = svc.acquire_session("alice").await.unwrap();
        svc.release_session("alice", handle).await;
        svc.shutdown().await.unwrap();

        let store = SessionStore::new(dir.path());
        let record = store.get("alice").await.unwrap();
        assert_eq!(record.cookies.len(), 1);
        assert_eq!(record.cookies[0].name, "session");
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.startup().await.unwrap();
        svc.shutdown().await.unwrap();
        svc.shutdown().await.unwrap();
        assert!(!svc.is_started());
    }
}
