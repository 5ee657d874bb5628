//! Pool occupancy snapshot: instantaneous gauges plus monotonically
//! increasing lifetime counters.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub idle: usize,
    pub pending_creates: usize,
    pub max_size: usize,
    /// Lifetime count of instances launched.
    pub created: u64,
    /// Lifetime count of instances removed (idle eviction, drain, disconnect).
    pub destroyed: u64,
    /// Lifetime count of acquisitions served from an idle entry.
    pub reused: u64,
}
