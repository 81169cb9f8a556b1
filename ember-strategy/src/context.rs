/// Context a registered strategy is constructed with (`spec.md` §4.4).
/// `marks` and `create_external_feed` are left to the caller (the
/// engine wires strategies to the live `ember_feed::FeedManager` output
/// or, in a backtest, to the historical replay stream) — this struct
/// only carries the configuration a strategy needs to validate its
/// parameters and label its signals.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub strategy_id: String,
    pub trade_symbol: String,
    pub feed_sources: Vec<String>,
}

impl StrategyContext {
    pub fn new(strategy_id: impl Into<String>, trade_symbol: impl Into<String>, feed_sources: Vec<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            trade_symbol: trade_symbol.into(),
            feed_sources,
        }
    }
}
