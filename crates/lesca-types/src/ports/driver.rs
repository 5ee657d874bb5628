//! The browser-automation driver: consumed by the coordination layer,
//! never implemented by it. Construction of a concrete handle is delegated
//! to an injected [`Launcher`] function.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cookie::Cookie;
use crate::error::Result;

/// An opaque reference to a running browser process.
#[async_trait]
pub trait BrowserHandle: Send + Sync + std::fmt::Debug {
    async fn is_connected(&self) -> bool;
    async fn close(&self) -> Result<()>;
    async fn contexts(&self) -> Result<Vec<Arc<dyn BrowserContext>>>;
}

/// The browser's isolation unit. A browser may hold multiple contexts; the
/// session store only ever operates on the first.
#[async_trait]
pub trait BrowserContext: Send + Sync + std::fmt::Debug {
    async fn cookies(&self) -> Result<Vec<Cookie>>;
    async fn add_cookies(&self, cookies: Vec<Cookie>) -> Result<()>;
    async fn close(&self) -> Result<()>;

    /// Evaluates `script` on the context's first page. Returns `None` if the
    /// context has no page -- storage injection/snapshotting on such a
    /// context is a no-op, not an error.
    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>>;
}

type LaunchFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn BrowserHandle>>> + Send>>;

/// A launcher constructs a new browser handle. Pools never construct or
/// introspect handles beyond the [`BrowserHandle`] surface; this is the only
/// seam where a concrete driver plugs in.
pub type Launcher = Arc<dyn Fn() -> LaunchFuture + Send + Sync>;
