use crate::{error::ValidationError, ids::TimestampMs};
use serde::{Deserialize, Serialize};

/// A normalised price observation from a single venue feed.
///
/// Invariant (`spec.md` §3): at least one of `bid`, `ask`, `last` must be
/// present. Ticks are immutable once constructed — `new` is the only way
/// to build one and it validates the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub t: TimestampMs,
    pub symbol: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask_size: Option<f64>,
}

/// Source to read a reference price from, per `spec.md` §4.4's
/// `priceFromTick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Last,
    Mid,
    Bid,
    Ask,
}

impl MarketTick {
    /// Constructs a validated tick. `symbol` is upper-cased per `spec.md`
    /// §3; all other invariants are enforced here, not at the boundary.
    pub fn new(
        t: TimestampMs,
        symbol: impl Into<String>,
        bid: Option<f64>,
        ask: Option<f64>,
        last: Option<f64>,
        bid_size: Option<f64>,
        ask_size: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into().to_uppercase();
        Self::validate(&symbol, bid, ask, last)?;
        Ok(Self {
            t,
            symbol,
            bid,
            ask,
            last,
            bid_size,
            ask_size,
        })
    }

    pub fn validate(symbol: &str, bid: Option<f64>, ask: Option<f64>, last: Option<f64>) -> Result<(), ValidationError> {
        for (field, value) in [("bid", bid), ("ask", ask), ("last", last)] {
            if let Some(v) = value {
                if v <= 0.0 {
                    return Err(ValidationError::NotPositive { field, value: v });
                }
            }
        }
        if bid.is_none() && ask.is_none() && last.is_none() {
            return Err(ValidationError::TickMissingPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves a reference price from this tick per the documented
    /// fallback order for each [`PriceSource`] (`spec.md` §4.4).
    ///
    /// - `Last`: last, else mid, else bid, else ask.
    /// - `Mid`: mid of bid/ask, else last.
    /// - `Bid`: bid, else last.
    /// - `Ask`: ask, else last.
    pub fn price_from(&self, source: PriceSource) -> Option<f64> {
        let mid = match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        };
        match source {
            PriceSource::Last => self.last.or(mid).or(self.bid).or(self.ask),
            PriceSource::Mid => mid.or(self.last),
            PriceSource::Bid => self.bid.or(self.last),
            PriceSource::Ask => self.ask.or(self.last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(bid: Option<f64>, ask: Option<f64>, last: Option<f64>) -> MarketTick {
        MarketTick {
            t: 1,
            symbol: "SIM".to_string(),
            bid,
            ask,
            last,
            bid_size: None,
            ask_size: None,
        }
    }

    #[test]
    fn rejects_tick_with_no_prices() {
        assert!(MarketTick::validate("SIM", None, None, None).is_err());
    }

    #[test]
    fn accepts_tick_with_only_last() {
        assert!(MarketTick::validate("SIM", None, None, Some(100.0)).is_ok());
    }

    #[test]
    fn mid_price_falls_back_to_last() {
        let t = tick(None, None, Some(101.0));
        assert_eq!(t.price_from(PriceSource::Mid), Some(101.0));
    }

    #[test]
    fn mid_price_uses_bid_ask_average() {
        let t = tick(Some(99.0), Some(101.0), Some(100.5));
        assert_eq!(t.price_from(PriceSource::Mid), Some(100.0));
    }

    #[test]
    fn bid_source_falls_back_to_last() {
        let t = tick(None, Some(101.0), Some(100.0));
        assert_eq!(t.price_from(PriceSource::Bid), Some(100.0));
    }
}
