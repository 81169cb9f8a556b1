//! Domain model and event schema for the Ember trading runtime: typed
//! events, ids, the clock capability, and the metrics sink contract.

pub mod balance;
pub mod clock;
pub mod error;
pub mod event;
pub mod fill;
pub mod ids;
pub mod metrics;
pub mod order;
pub mod position;
pub mod tick;

pub use balance::{AssetBalance, BalanceSnapshot, MarginSummary};
pub use clock::{Clock, ClockRewindError, ManualClock, SystemClock};
pub use error::ValidationError;
pub use event::{DomainEvent, EventKind, SignalAction, StrategySignalPayload};
pub use fill::{Fill, Liquidity};
pub use ids::{position_id, EventId, TimestampMs};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use order::{OrderNew, OrderType, Side, TimeInForce};
pub use position::Position;
pub use tick::{MarketTick, PriceSource};
