//! Top-level browser service configuration.

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory session records are persisted under.
    pub session_dir: String,
    /// Whether `startup()` restores sessions found in `session_dir`.
    pub auto_restore: bool,
    /// Whether `shutdown()` snapshots live sessions back to `session_dir`.
    pub persist_on_shutdown: bool,
    /// Whether acquisitions route through the browser pool at all, or
    /// launch-and-close a fresh instance per call.
    pub pooling_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session_dir: "./lesca-sessions".to_string(),
            auto_restore: true,
            persist_on_shutdown: true,
            pooling_enabled: true,
        }
    }
}
