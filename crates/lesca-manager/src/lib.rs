//! One browser pool per named session, with bounded retry on contention.

pub mod manager;

pub use manager::{SessionPoolManager, SessionPoolManagerConfig};
