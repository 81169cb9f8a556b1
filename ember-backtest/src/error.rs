use ember_core::ClockRewindError;
use ember_store::StoreError;
use thiserror::Error;

/// Error taxonomy for the backtest harness (`spec.md` §4.9, §7). Anything
/// that would corrupt the determinism contract surfaces here rather than
/// being absorbed.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("backtest clock error: {0}")]
    Clock(#[from] ClockRewindError),

    #[error("event store error: {0}")]
    Store(#[from] StoreError),

    #[error("event failed validation: {0}")]
    Validation(#[from] ember_core::ValidationError),
}
