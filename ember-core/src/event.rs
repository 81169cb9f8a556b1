use crate::{
    balance::MarginSummary,
    error::ValidationError,
    fill::Fill,
    ids::{EventId, TimestampMs},
    order::OrderNew,
    position::Position,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tagged union of every event kind the system persists (`spec.md` §3).
/// Each variant carries a strictly-typed payload — never an unstructured
/// dictionary — per the "Dynamic event payloads" design note in `spec.md`
/// §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventKind {
    #[serde(rename = "market.tick")]
    MarketTick(crate::tick::MarketTick),
    #[serde(rename = "market.bar")]
    MarketBar(MarketBar),
    #[serde(rename = "strategy.signal")]
    StrategySignal(StrategySignalPayload),
    #[serde(rename = "strategy.intent")]
    StrategyIntent(StrategyIntentPayload),
    #[serde(rename = "risk.check")]
    RiskCheck(RiskCheckPayload),
    #[serde(rename = "order.new")]
    OrderNew(OrderNew),
    #[serde(rename = "order.ack")]
    OrderAck(OrderAckPayload),
    #[serde(rename = "order.reject")]
    OrderReject(OrderRejectPayload),
    #[serde(rename = "order.cancel")]
    OrderCancel(OrderCancelPayload),
    #[serde(rename = "order.fill")]
    OrderFill(Fill),
    #[serde(rename = "portfolio.snapshot")]
    PortfolioSnapshot(PortfolioSnapshotPayload),
    #[serde(rename = "position.mark")]
    PositionMark(PositionMarkPayload),
    #[serde(rename = "sentiment.update")]
    SentimentUpdate(SentimentUpdatePayload),
    #[serde(rename = "pnl.analytics")]
    PnlAnalytics(PnlAnalyticsPayload),
    #[serde(rename = "backtest.artifact")]
    BacktestArtifact(BacktestArtifactPayload),
    #[serde(rename = "account.balance.adjusted")]
    AccountBalanceAdjusted(BalanceAdjustedPayload),
    #[serde(rename = "account.balance.snapshot")]
    AccountBalanceSnapshot(BalanceSnapshotPayload),
    #[serde(rename = "account.margin.updated")]
    AccountMarginUpdated(MarginUpdatedPayload),
    #[serde(rename = "account.transfer")]
    AccountTransfer(TransferPayload),
    #[serde(rename = "account.transfer.requested")]
    AccountTransferRequested(TransferRequestedPayload),
}

impl EventKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EventKind::MarketTick(_) => "market.tick",
            EventKind::MarketBar(_) => "market.bar",
            EventKind::StrategySignal(_) => "strategy.signal",
            EventKind::StrategyIntent(_) => "strategy.intent",
            EventKind::RiskCheck(_) => "risk.check",
            EventKind::OrderNew(_) => "order.new",
            EventKind::OrderAck(_) => "order.ack",
            EventKind::OrderReject(_) => "order.reject",
            EventKind::OrderCancel(_) => "order.cancel",
            EventKind::OrderFill(_) => "order.fill",
            EventKind::PortfolioSnapshot(_) => "portfolio.snapshot",
            EventKind::PositionMark(_) => "position.mark",
            EventKind::SentimentUpdate(_) => "sentiment.update",
            EventKind::PnlAnalytics(_) => "pnl.analytics",
            EventKind::BacktestArtifact(_) => "backtest.artifact",
            EventKind::AccountBalanceAdjusted(_) => "account.balance.adjusted",
            EventKind::AccountBalanceSnapshot(_) => "account.balance.snapshot",
            EventKind::AccountMarginUpdated(_) => "account.margin.updated",
            EventKind::AccountTransfer(_) => "account.transfer",
            EventKind::AccountTransferRequested(_) => "account.transfer.requested",
        }
    }

    /// Validates this variant's payload. Called by the event store on
    /// `append`; an invalid event fails the whole batch (`spec.md` §4.1).
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            EventKind::MarketTick(t) => crate::tick::MarketTick::validate(&t.symbol, t.bid, t.ask, t.last),
            EventKind::OrderNew(o) => {
                if o.qty <= 0.0 {
                    return Err(ValidationError::InvalidQuantity(o.qty));
                }
                if o.order_type == crate::order::OrderType::Limit && o.px.is_none() {
                    return Err(ValidationError::LimitOrderMissingPrice);
                }
                Ok(())
            }
            EventKind::OrderFill(f) => {
                if f.qty <= 0.0 {
                    return Err(ValidationError::InvalidQuantity(f.qty));
                }
                if f.px <= 0.0 {
                    return Err(ValidationError::NotPositive { field: "px", value: f.px });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Envelope every persisted event carries: an id, an emission timestamp,
/// and the typed payload (`spec.md` §3 "Identifiers").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub ts: TimestampMs,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl DomainEvent {
    pub fn new(ts: TimestampMs, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            ts,
            metadata: None,
            kind,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.kind.validate()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.kind_name()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketBar {
    pub t: TimestampMs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignalPayload {
    pub strategy_id: String,
    pub symbol: String,
    pub action: SignalAction,
    pub px: f64,
    pub t: TimestampMs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyIntentPayload {
    pub strategy_id: String,
    pub symbol: String,
    pub side: crate::order::Side,
    pub qty: f64,
    pub meta: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckPayload {
    pub order_id: EventId,
    pub allowed: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAckPayload {
    pub order_id: EventId,
    pub venue_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectPayload {
    pub order_id: EventId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelPayload {
    pub order_id: EventId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshotPayload {
    pub positions: HashMap<String, Position>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionMarkPayload {
    pub symbol_hash: u64,
    pub mark: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentUpdatePayload {
    pub symbol: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PnlAnalyticsPayload {
    pub nav: f64,
    pub realized_gross: f64,
    pub fees_paid: f64,
    pub unrealized: f64,
}

impl PnlAnalyticsPayload {
    pub fn net_realized(&self) -> f64 {
        self.realized_gross - self.fees_paid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestArtifactPayload {
    pub name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAdjustedPayload {
    pub venue: String,
    pub asset: String,
    pub delta: f64,
    pub new_total: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshotPayload {
    pub venue: String,
    pub asset: String,
    pub provider_total: f64,
    pub ledger_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginUpdatedPayload {
    pub venue: String,
    pub summary: MarginSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPayload {
    pub from_venue: String,
    pub to_venue: String,
    pub asset: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequestedPayload {
    pub from_venue: String,
    pub to_venue: String,
    pub asset: String,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::MarketTick;

    #[test]
    fn tick_event_validates_through_kind() {
        let tick = MarketTick::new(1, "SIM", None, None, Some(100.0), None, None).unwrap();
        let event = DomainEvent::new(1, EventKind::MarketTick(tick));
        assert!(event.validate().is_ok());
        assert_eq!(event.type_name(), "market.tick");
    }

    #[test]
    fn serde_round_trip_preserves_kind_tag() {
        let tick = MarketTick::new(1, "SIM", None, None, Some(100.0), None, None).unwrap();
        let event = DomainEvent::new(5, EventKind::MarketTick(tick));
        let json = serde_json::to_string(&event).unwrap();
        let back: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ts, 5);
        assert_eq!(back.type_name(), "market.tick");
    }
}
