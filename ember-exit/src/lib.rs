//! Exit rule evaluation against an open position: TP/SL-sigma,
//! fair-value reversion, time stop, trailing, and risk overrides
//! (`spec.md` §4.8).

pub mod engine;
pub mod order;
pub mod params;
pub mod position;
pub mod reason;

pub use engine::ExitEngine;
pub use order::ExitOrderRequest;
pub use params::{ExitParams, FairValueParams, TimeStopParams, TpSlSigmaParams, TrailingParams};
pub use position::OpenPosition;
pub use reason::{ExitReason, FlattenScope};
