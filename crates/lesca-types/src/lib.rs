//! Shared types and ports for the lesca browser-pool coordination layer.
//!
//! This crate breaks circular dependencies between the pool, session-store,
//! reliability and service crates, the same role `riptide-types` plays for
//! the wider Riptide workspace.

pub mod cookie;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod session;

pub use cookie::Cookie;
pub use error::{ErrorContext, LescaError, Result};
pub use metrics::{DestroyReason, MetricEvent, MetricsCollector, NullMetricsCollector};
pub use ports::{BrowserContext, BrowserHandle, Launcher, PoolHandle};
pub use session::{SessionMetadata, SessionRecord};
