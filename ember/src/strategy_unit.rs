use crate::config::{StrategyDef, StrategyParams};
use crate::error::EngineError;
use ember_core::{MarketTick, PriceSource, TimestampMs};
use ember_strategy::registry::{ArbitrageStrategy, MomentumStrategy, PairStrategy};
use ember_strategy::StrategySignal;

/// Drives one configured strategy off the merged tick stream.
///
/// `ember_strategy::registry` strategies don't share one `on_tick`
/// signature: [`MomentumStrategy`] takes a single feed's tick directly,
/// while [`PairStrategy`] and [`ArbitrageStrategy`] each need two named
/// price series (base/quote, primary/secondary) fed independently. This
/// wraps each registered kind behind one dispatch method keyed by the
/// feed id a tick arrived on, so the engine's run loop can stay ignorant
/// of which concrete strategy it's driving.
pub enum StrategyUnit {
    Momentum { feed_id: String, strategy: MomentumStrategy },
    Pair { base_feed: String, quote_feed: String, last_base: Option<f64>, last_quote: Option<f64>, strategy: PairStrategy },
    Arbitrage { primary_feed: String, secondary_feed: String, strategy: ArbitrageStrategy },
}

impl StrategyUnit {
    pub fn build(def: &StrategyDef) -> Result<Self, EngineError> {
        match &def.params {
            StrategyParams::Momentum(params) => {
                let strategy = MomentumStrategy::new(def.id.clone(), def.trade_symbol.clone(), params.clone())
                    .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
                Ok(StrategyUnit::Momentum { feed_id: def.feeds[0].clone(), strategy })
            }
            StrategyParams::Pair(params) => {
                let strategy = PairStrategy::new(def.id.clone(), def.trade_symbol.clone(), params.clone())
                    .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
                Ok(StrategyUnit::Pair {
                    base_feed: def.feeds[0].clone(),
                    quote_feed: def.feeds[1].clone(),
                    last_base: None,
                    last_quote: None,
                    strategy,
                })
            }
            StrategyParams::Arbitrage(params) => {
                let strategy = ArbitrageStrategy::new(def.id.clone(), def.trade_symbol.clone(), params.clone())
                    .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
                Ok(StrategyUnit::Arbitrage { primary_feed: def.feeds[0].clone(), secondary_feed: def.feeds[1].clone(), strategy })
            }
        }
    }

    /// Feeds `tick` (received on `feed_id`) through whichever rule this
    /// unit wraps. Returns `None` whenever the tick isn't relevant to
    /// this unit's feeds, or the wrapped strategy has nothing to emit.
    pub fn on_tick(&mut self, feed_id: &str, tick: &MarketTick, now_ms: TimestampMs) -> Option<StrategySignal> {
        let px = tick.price_from(PriceSource::Last)?;
        match self {
            StrategyUnit::Momentum { feed_id: fid, strategy } => {
                if fid != feed_id {
                    return None;
                }
                strategy.on_tick(feed_id, tick, now_ms)
            }
            StrategyUnit::Pair { base_feed, quote_feed, last_base, last_quote, strategy } => {
                if feed_id == base_feed {
                    *last_base = Some(px);
                } else if feed_id == quote_feed {
                    *last_quote = Some(px);
                } else {
                    return None;
                }
                let base = (*last_base)?;
                let quote = (*last_quote)?;
                strategy.on_prices(base, quote, now_ms)
            }
            StrategyUnit::Arbitrage { primary_feed, secondary_feed, strategy } => {
                if feed_id == primary_feed {
                    strategy.on_primary(px, now_ms)
                } else if feed_id == secondary_feed {
                    strategy.on_secondary(px, now_ms)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_exit::ExitParams;
    use ember_strategy::registry::{ArbitrageParams, MomentumParams, PairParams};

    fn tick(feed_symbol: &str, t: i64, px: f64) -> MarketTick {
        MarketTick::new(t, feed_symbol, None, None, Some(px), None, None).unwrap()
    }

    fn momentum_def() -> StrategyDef {
        StrategyDef {
            id: "mom".into(),
            trade_symbol: "SIM".into(),
            feeds: vec!["hist".into()],
            priority: 0,
            mode: crate::config::StrategyMode::Sandbox,
            budget: 1_000.0,
            exit: ExitParams::default(),
            params: StrategyParams::Momentum(MomentumParams {
                fast_window: 2,
                slow_window: 3,
                min_consensus: 1,
                max_skew_ms: 1_000,
                max_signal_age_ms: 60_000,
                min_action_interval_ms: 0,
            }),
        }
    }

    #[test]
    fn momentum_unit_ignores_ticks_from_other_feeds() {
        let mut unit = StrategyUnit::build(&momentum_def()).unwrap();
        assert!(unit.on_tick("other-feed", &tick("SIM", 1, 100.0), 1).is_none());
    }

    #[test]
    fn pair_unit_waits_for_both_legs_before_emitting() {
        let def = StrategyDef {
            id: "pair".into(),
            trade_symbol: "SIM".into(),
            feeds: vec!["base".into(), "quote".into()],
            priority: 0,
            mode: crate::config::StrategyMode::Sandbox,
            budget: 1_000.0,
            exit: ExitParams::default(),
            params: StrategyParams::Pair(PairParams { window: 3, entry_z: 1.0, exit_z: 0.2, min_interval_ms: 0, epsilon: 1e-9 }),
        };
        let mut unit = StrategyUnit::build(&def).unwrap();
        assert!(unit.on_tick("base", &tick("BASE", 1, 100.0), 1).is_none());
    }

    #[test]
    fn arbitrage_unit_evaluates_on_either_leg() {
        let def = StrategyDef {
            id: "arb".into(),
            trade_symbol: "SIM".into(),
            feeds: vec!["primary".into(), "secondary".into()],
            priority: 0,
            mode: crate::config::StrategyMode::Sandbox,
            budget: 1_000.0,
            exit: ExitParams::default(),
            params: StrategyParams::Arbitrage(ArbitrageParams { max_age_ms: 10_000, spread_bps: 5.0, min_interval_ms: 0 }),
        };
        let mut unit = StrategyUnit::build(&def).unwrap();
        assert!(unit.on_tick("primary", &tick("PRI", 1, 100.0), 1).is_none());
        let signal = unit.on_tick("secondary", &tick("SEC", 1, 100.2), 1);
        assert!(signal.is_some());
    }
}
