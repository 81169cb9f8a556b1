use ember_core::{MarketTick, TimestampMs};
use ember_strategy::StrategySignal;

/// The seam the harness drives ticks through (`spec.md` §4.9's dependency
/// injection). A thin single-feed specialization of the live
/// `StrategyContext` wiring: the harness only ever has one historical
/// feed, so there is no multi-feed consensus to thread through here.
/// Blanket-implemented for any matching closure so registry strategies
/// (`ember_strategy::registry::*`) can be driven by wrapping their
/// `on_tick(feed_id, tick, now_ms)` in a closure that fixes `feed_id`.
pub trait BacktestStrategy: Send {
    fn on_tick(&mut self, tick: &MarketTick, now_ms: TimestampMs) -> Option<StrategySignal>;
}

impl<F> BacktestStrategy for F
where
    F: FnMut(&MarketTick, TimestampMs) -> Option<StrategySignal> + Send,
{
    fn on_tick(&mut self, tick: &MarketTick, now_ms: TimestampMs) -> Option<StrategySignal> {
        self(tick, now_ms)
    }
}
