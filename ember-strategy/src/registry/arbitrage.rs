use crate::error::StrategyError;
use crate::signal::StrategySignal;
use ember_core::SignalAction;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArbitrageParams {
    pub max_age_ms: i64,
    pub spread_bps: f64,
    pub min_interval_ms: i64,
}

impl ArbitrageParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.spread_bps <= 0.0 {
            return Err(StrategyError::InvalidParams("spreadBps must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct VenuePrice {
    px: f64,
    t: i64,
}

/// Two-venue arbitrage strategy (`spec.md` §4.4). Compares the most
/// recent synchronized pair of primary/secondary prices; emits BUY when
/// the secondary trades at a premium beyond `spread_bps`, SELL when at a
/// discount, gated by `max_age_ms` staleness and `min_interval_ms`.
pub struct ArbitrageStrategy {
    strategy_id: String,
    symbol: String,
    params: ArbitrageParams,
    primary: Option<VenuePrice>,
    secondary: Option<VenuePrice>,
    last_emit_ts: Option<i64>,
}

impl ArbitrageStrategy {
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        params: ArbitrageParams,
    ) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            params,
            primary: None,
            secondary: None,
            last_emit_ts: None,
        })
    }

    pub fn on_primary(&mut self, px: f64, t: i64) -> Option<StrategySignal> {
        self.primary = Some(VenuePrice { px, t });
        self.evaluate(t)
    }

    pub fn on_secondary(&mut self, px: f64, t: i64) -> Option<StrategySignal> {
        self.secondary = Some(VenuePrice { px, t });
        self.evaluate(t)
    }

    fn evaluate(&mut self, now_t: i64) -> Option<StrategySignal> {
        let (primary, secondary) = (self.primary?, self.secondary?);
        if (primary.t - secondary.t).abs() > self.params.max_age_ms {
            return None;
        }
        if primary.px == 0.0 {
            return None;
        }

        let spread_bps = (secondary.px - primary.px) / primary.px * 10_000.0;
        if spread_bps.abs() < self.params.spread_bps {
            return None;
        }
        if let Some(last) = self.last_emit_ts {
            if now_t - last < self.params.min_interval_ms {
                return None;
            }
        }

        let action = if spread_bps > 0.0 { SignalAction::Buy } else { SignalAction::Sell };
        self.last_emit_ts = Some(now_t);
        Some(StrategySignal {
            strategy_id: self.strategy_id.clone(),
            symbol: self.symbol.clone(),
            action,
            px: primary.px,
            t: primary.t.max(secondary.t),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ArbitrageParams {
        ArbitrageParams { max_age_ms: 500, spread_bps: 10.0, min_interval_ms: 0 }
    }

    #[test]
    fn emits_buy_when_secondary_trades_at_premium() {
        let mut strat = ArbitrageStrategy::new("arb", "SIM", params()).unwrap();
        assert!(strat.on_primary(100.0, 0).is_none());
        let sig = strat.on_secondary(100.20, 10).unwrap();
        assert_eq!(sig.action, SignalAction::Buy);
    }

    #[test]
    fn suppresses_when_prices_are_stale_relative_to_each_other() {
        let mut strat = ArbitrageStrategy::new("arb", "SIM", params()).unwrap();
        strat.on_primary(100.0, 0);
        assert!(strat.on_secondary(100.5, 10_000).is_none());
    }

    #[test]
    fn emitted_timestamp_is_the_max_of_the_two_legs_even_when_the_older_leg_arrives_last() {
        let mut strat = ArbitrageStrategy::new("arb", "SIM", params()).unwrap();
        assert!(strat.on_secondary(100.20, 50).is_none());
        // The primary tick arrives later in wall-clock order but carries an
        // older timestamp than the secondary tick already on hand.
        let sig = strat.on_primary(100.0, 10).unwrap();
        assert_eq!(sig.t, 50);
    }
}
