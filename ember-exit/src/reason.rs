/// Why an exit order was emitted (`spec.md` §4.8); stamped as
/// `meta.reason` on the resulting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Tp,
    Sl,
    /// The epsilon-proximity-to-fair half of fair-value reversion.
    /// `spec.md` §4.8 names `EXIT_SIGNAL_FLIP` for the opposite-signal
    /// half of the same rule but doesn't name this half separately; we
    /// give it its own tag rather than overload `EXIT_SIGNAL_FLIP` for a
    /// condition that isn't actually a signal flip (see `DESIGN.md`).
    FairValue,
    Time,
    Trailing,
    SignalFlip,
    Risk,
}

impl ExitReason {
    pub fn tag(&self) -> &'static str {
        match self {
            ExitReason::Tp => "EXIT_TP",
            ExitReason::Sl => "EXIT_SL",
            ExitReason::FairValue => "EXIT_FAIR_VALUE",
            ExitReason::Time => "EXIT_TIME",
            ExitReason::Trailing => "EXIT_TRAILING",
            ExitReason::SignalFlip => "EXIT_SIGNAL_FLIP",
            ExitReason::Risk => "EXIT_RISK",
        }
    }
}

/// Scope of a risk-override flatten (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenScope {
    FlattenSymbol,
    FlattenAll,
}
