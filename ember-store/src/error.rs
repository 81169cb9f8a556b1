use ember_core::ValidationError;
use thiserror::Error;

/// Error taxonomy for the event store, mapped from `spec.md` §7's kinds.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("transient store error, retryable: {0}")]
    Transient(String),

    #[error("fatal store error: {0}")]
    Fatal(String),

    #[error("projection reducer detected inconsistent data: {0}")]
    InvariantViolation(String),

    #[error("snapshot {0} not found")]
    SnapshotNotFound(String),
}
