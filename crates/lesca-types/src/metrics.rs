//! Metric event schema emitted by the pool, manager and service.
//!
//! Components only ever emit; nothing in the coordination layer reads its
//! own events back. A sink implements [`MetricsCollector`].

use async_trait::async_trait;

/// Why a pooled entry was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    Idle,
    Drain,
    Error,
    Disconnected,
}

impl std::fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DestroyReason::Idle => "idle",
            DestroyReason::Drain => "drain",
            DestroyReason::Error => "error",
            DestroyReason::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// A single lifecycle event. `timestamp` is milliseconds since the epoch.
#[derive(Debug, Clone)]
pub enum MetricEvent {
    PoolAcquire {
        timestamp: i64,
        duration_ms: u64,
        reused: bool,
        pool_size: usize,
        session_name: Option<String>,
    },
    PoolRelease {
        timestamp: i64,
        duration_ms: u64,
        pool_size: usize,
        session_name: Option<String>,
    },
    PoolFailure {
        timestamp: i64,
        error: String,
        session_name: Option<String>,
    },
    PoolExhausted {
        timestamp: i64,
        wait_ms: u64,
        pool_size: usize,
        max_size: usize,
        session_name: Option<String>,
    },
    PoolBrowserCreated {
        timestamp: i64,
        duration_ms: u64,
        pool_size: usize,
        session_name: Option<String>,
    },
    PoolBrowserDestroyed {
        timestamp: i64,
        reason: DestroyReason,
        pool_size: usize,
        session_name: Option<String>,
    },
}

/// A sink for lifecycle events. Implementations must not throw/panic from
/// `record` -- events are advisory and never block the coordination layer.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn record(&self, event: MetricEvent);
}

/// A collector that drops every event. The default when no sink is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsCollector;

#[async_trait]
impl MetricsCollector for NullMetricsCollector {
    async fn record(&self, _event: MetricEvent) {}
}
