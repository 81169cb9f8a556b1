use ember_core::ValidationError;
use ember_store::StoreError;
use thiserror::Error;

/// All errors generated wiring and running an [`crate::engine::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration invalid: {0}")]
    InvalidConfig(String),

    #[error("event store error: {0}")]
    Store(#[from] StoreError),

    #[error("order validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("no feed registered for id '{0}'")]
    UnknownFeed(String),
}
