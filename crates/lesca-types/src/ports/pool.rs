//! The acquire/release/drain capability set shared by a single browser pool
//! and a session-bound view onto the session pool manager.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::ports::driver::BrowserHandle;

/// Satisfied by both `BrowserPool` and a session-scoped handle onto the
/// session pool manager. The browser service discovers which one it holds
/// through this interface rather than through a class hierarchy.
#[async_trait]
pub trait PoolHandle: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn BrowserHandle>>;
    async fn release(&self, handle: Arc<dyn BrowserHandle>);
}
