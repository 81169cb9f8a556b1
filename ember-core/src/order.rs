use crate::{
    error::ValidationError,
    ids::{EventId, TimestampMs},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Signed direction used throughout edge/exposure math: `+1` for
    /// `Buy`, `-1` for `Sell` (`spec.md` §4.5).
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Ioc,
    Fok,
    Day,
}

/// A candidate order, built by the intent builder and validated again at
/// construction. Invariant (`spec.md` §3): `type = Limit => px` present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNew {
    pub id: EventId,
    pub t: TimestampMs,
    pub symbol: String,
    pub side: Side,
    pub qty: f64,
    pub order_type: OrderType,
    pub px: Option<f64>,
    pub tif: TimeInForce,
    pub account: String,
    pub meta: HashMap<String, serde_json::Value>,
}

impl OrderNew {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        t: TimestampMs,
        symbol: impl Into<String>,
        side: Side,
        qty: f64,
        order_type: OrderType,
        px: Option<f64>,
        tif: TimeInForce,
        account: impl Into<String>,
        meta: HashMap<String, serde_json::Value>,
    ) -> Result<Self, ValidationError> {
        if qty <= 0.0 {
            return Err(ValidationError::InvalidQuantity(qty));
        }
        if let Some(p) = px {
            if p <= 0.0 {
                return Err(ValidationError::NotPositive { field: "px", value: p });
            }
        }
        if order_type == OrderType::Limit && px.is_none() {
            return Err(ValidationError::LimitOrderMissingPrice);
        }
        Ok(Self {
            id: EventId::new(),
            t,
            symbol: symbol.into(),
            side,
            qty,
            order_type,
            px,
            tif,
            account: account.into(),
            meta,
        })
    }

    /// `true` when this order is tagged as a position-reducing exit order
    /// per `spec.md` §4.6 ("Exit orders ... tagged meta.exit=true").
    pub fn is_exit(&self) -> bool {
        matches!(self.meta.get("exit"), Some(serde_json::Value::Bool(true)))
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta.get(key).and_then(|v| v.as_f64())
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }
}
