use ember_core::OrderNew;

/// Optional per-asset available-balance and reservation hook
/// (`spec.md` §4.6). When absent, `PreTradeRisk` skips the
/// `insufficient-quote`/`insufficient-base` checks entirely.
pub trait AccountExposureGuard: Send + Sync {
    fn available_quote(&self, symbol: &str) -> Option<f64>;
    fn available_base(&self, symbol: &str) -> Option<f64>;
    fn reserve_quote(&mut self, symbol: &str, amount: f64);
    fn reserve_base(&mut self, symbol: &str, amount: f64);
    fn release_quote(&mut self, symbol: &str, amount: f64);
    fn release_base(&mut self, symbol: &str, amount: f64);
}

/// Optional margin/leverage budget guard for SPOT-margin or PERP
/// accounts (`spec.md` §4.6).
pub trait MarketExposureGuard: Send + Sync {
    /// Attempts to reserve `notional` against the order's margin
    /// budget. Returns `false` (and reserves nothing) if it would
    /// exceed the budget.
    fn check_and_reserve(&mut self, order: &OrderNew, notional: f64) -> bool;
    fn release(&mut self, order: &OrderNew, notional: f64);
}
