//! Error kinds for the lesca coordination layer.
//!
//! Every error surfaces as a tagged variant carrying a stable machine-readable
//! code, a human message and a structured context map, mirroring the error
//! taxonomy `riptide-types::error::riptide_error` uses for the wider crawler.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Result type alias using [`LescaError`].
pub type Result<T> = std::result::Result<T, LescaError>;

/// Structured, loggable context attached to an error (session name, pool
/// size, timeout, ...). Kept as an ordered map so `Display` output is
/// deterministic in logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext(BTreeMap<String, String>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Error taxonomy for the coordination layer.
#[derive(Debug, Error)]
pub enum LescaError {
    /// Construction-time validation failure. Fatal to construction.
    #[error("invalid config: {message} ({context})")]
    InvalidConfig { message: String, context: ErrorContext },

    /// The underlying driver's launch raised. Retried by the circuit
    /// breaker, propagated after the failure threshold trips.
    #[error("browser launch failed: {message} ({context})")]
    LaunchFailed {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A wait for an idle entry exceeded its bound.
    #[error("pool exhausted after waiting {timeout_ms}ms (pool_size={pool_size}, max_size={max_size})")]
    PoolExhausted {
        timeout_ms: u64,
        pool_size: usize,
        max_size: usize,
        session_name: Option<String>,
    },

    /// `acquire` was called after `drain()`. Fatal to that call.
    #[error("pool is shutting down ({context})")]
    PoolShuttingDown { context: ErrorContext },

    /// The circuit breaker rejected the call while open.
    #[error("circuit open: {failures} failures, {remaining_ms}ms remaining of {reset_timeout_ms}ms cooldown")]
    CircuitOpen {
        failures: u32,
        reset_timeout_ms: u64,
        remaining_ms: u64,
    },

    /// `get`/`rename`/`merge` referenced a session with no matching record.
    #[error("session not found: {name}")]
    SessionNotFound { name: String },

    /// A session file failed to parse or had an invalid shape. Handled
    /// locally (quarantined); this variant exists for callers that want to
    /// observe the event rather than silently getting `None`.
    #[error("session data corrupted: {message}")]
    Corrupted { message: String },

    /// The service was accessed before `startup()`. Fatal to that call.
    #[error("service not started")]
    NotStarted,

    /// The session pool manager exhausted its retry budget.
    #[error("acquire failed for session '{session_name}': {message} ({context})")]
    AcquireFailed {
        session_name: String,
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LescaError {
    /// Stable machine-readable code, independent of the `Display` message.
    pub fn code(&self) -> &'static str {
        match self {
            LescaError::InvalidConfig { .. } => "invalid_config",
            LescaError::LaunchFailed { .. } => "launch_failed",
            LescaError::PoolExhausted { .. } => "pool_exhausted",
            LescaError::PoolShuttingDown { .. } => "pool_shutting_down",
            LescaError::CircuitOpen { .. } => "circuit_open",
            LescaError::SessionNotFound { .. } => "session_not_found",
            LescaError::Corrupted { .. } => "corrupted",
            LescaError::NotStarted => "not_started",
            LescaError::AcquireFailed { .. } => "acquire_failed",
        }
    }

    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        LescaError::InvalidConfig {
            message: message.into(),
            context: ErrorContext::new().with("field", field),
        }
    }
}
