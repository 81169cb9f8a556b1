use ember_core::TimestampMs;
use thiserror::Error;

/// Errors raised by an [`crate::adapter::ExecutionAdapter`] and the policy
/// wrapper around it (`spec.md` §7's error taxonomy, shaped after
/// `barter-execution::error::ExecutionError`).
#[derive(Debug, Error, Clone)]
pub enum ExecutionError {
    /// Recoverable adapter failure (connection reset, 5xx, 429, timeout).
    /// Retried with backoff by the policy wrapper.
    #[error("transient execution error from {adapter}: {reason}")]
    TransientIo { adapter: String, reason: String },

    /// Non-recoverable adapter failure (4xx other than 429, auth failure).
    /// Surfaced as an `order.reject`; counts against the circuit breaker.
    #[error("fatal execution error from {adapter}: {reason}")]
    FatalIo { adapter: String, reason: String },

    /// Submit refused because the circuit is open; caller may hold,
    /// requeue, or abandon.
    #[error("circuit open for {adapter}, retry at {retry_at}")]
    CircuitOpen { adapter: String, retry_at: TimestampMs },

    /// Retry budget exhausted without a terminal success or fatal error.
    #[error("{adapter} exceeded max submit attempts ({attempts})")]
    MaxAttemptsExceeded { adapter: String, attempts: u32 },

    /// Reducer or reconciler detected inconsistent state that must not be
    /// silently ignored.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ExecutionError {
    /// Whether this error should be retried by the policy wrapper
    /// (`spec.md` §4.7's `Retryable(bool)`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::TransientIo { .. })
    }
}
