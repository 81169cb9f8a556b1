use crate::reason::{ExitReason, FlattenScope};
use ember_core::{OrderNew, OrderType, Side, TimeInForce, TimestampMs, ValidationError};
use std::collections::HashMap;

/// An exit decision waiting to be turned into an order. Always a market
/// IOC order on the side opposite the position being closed, tagged
/// `meta.exit=true` and `meta.reason` (`spec.md` §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ExitOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub qty: f64,
    pub reason: ExitReason,
    pub scope: Option<FlattenScope>,
}

impl ExitOrderRequest {
    pub fn into_order(self, t: TimestampMs, account: impl Into<String>) -> Result<OrderNew, ValidationError> {
        let mut meta = HashMap::new();
        meta.insert("exit".to_string(), serde_json::Value::Bool(true));
        meta.insert("reason".to_string(), serde_json::Value::String(self.reason.tag().to_string()));
        if let Some(scope) = self.scope {
            let scope_str = match scope {
                FlattenScope::FlattenSymbol => "FLATTEN_SYMBOL",
                FlattenScope::FlattenAll => "FLATTEN_ALL",
            };
            meta.insert("scope".to_string(), serde_json::Value::String(scope_str.to_string()));
        }
        OrderNew::new(t, self.symbol, self.side, self.qty, OrderType::Market, None, TimeInForce::Ioc, account, meta)
    }
}
