//! A broadcast event bus and the collectors that subscribe to it.

pub mod bus;
pub mod collector;

pub use bus::MetricsBus;
pub use collector::InMemoryCollector;
