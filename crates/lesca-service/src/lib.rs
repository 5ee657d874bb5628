//! The top-level entry point: idempotent startup/shutdown, session
//! auto-restore, and persist-on-shutdown, wired on top of the pool,
//! manager, session store and metrics crates.

pub mod service;

pub use service::BrowserService;
