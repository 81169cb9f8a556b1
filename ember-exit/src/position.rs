use ember_core::{Side, TimestampMs};

/// The open position an `ExitEngine` evaluates rules against, armed on
/// open (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub qty: f64,
    pub entry_px: f64,
    pub opened_t: TimestampMs,
}

impl OpenPosition {
    /// Signed fractional PnL at `px`: positive for a favorable move.
    pub fn pnl_frac(&self, px: f64) -> f64 {
        self.side.sign() * (px - self.entry_px) / self.entry_px
    }
}
