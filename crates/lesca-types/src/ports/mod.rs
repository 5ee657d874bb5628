//! Narrow interfaces to collaborators the coordination layer does not
//! implement itself: the browser-automation driver and the pool/manager
//! acquire-release capability set.

pub mod driver;
pub mod pool;

pub use driver::{BrowserContext, BrowserHandle, Launcher};
pub use pool::PoolHandle;
