use thiserror::Error;

/// Errors raised while validating a [`crate::event::DomainEvent`] or any of
/// the value types it carries. Fatal at the call site per `spec.md` §7:
/// the event is not appended and the error is logged by the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("market tick for {symbol} must have at least one of bid/ask/last")]
    TickMissingPrice { symbol: String },

    #[error("limit order must carry a price")]
    LimitOrderMissingPrice,

    #[error("order quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("{field} is required for event kind {kind}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("symbol must be upper-case, got {0}")]
    SymbolNotUpperCase(String),
}
