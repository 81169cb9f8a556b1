use crate::ids::{EventId, TimestampMs};
use crate::order::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liquidity {
    Maker,
    Taker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: EventId,
    pub order_id: EventId,
    pub t: TimestampMs,
    pub symbol: String,
    pub px: f64,
    pub qty: f64,
    pub side: Side,
    pub fee: Option<f64>,
    pub liquidity: Option<Liquidity>,
}

impl Fill {
    /// Signed notional this fill contributes to a position: positive for
    /// buys, negative for sells.
    pub fn signed_qty(&self) -> f64 {
        self.qty * self.side.sign()
    }
}
