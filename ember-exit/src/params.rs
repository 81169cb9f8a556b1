/// TP/SL-sigma rule parameters (`spec.md` §4.8). Armed when a position
/// opens; σ is the std-dev of fractional returns over `sigma_lookback_ms`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TpSlSigmaParams {
    pub sigma_lookback_ms: i64,
    pub tp_sigma: f64,
    pub sl_sigma: f64,
    /// When `true`, an adverse excursion only checks `sl_sigma` and a
    /// favorable one only checks `tp_sigma` — neither threshold is
    /// evaluated against the other side's excursion.
    pub asymmetric: bool,
}

/// Fair-value reversion rule parameters (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FairValueParams {
    pub epsilon_bps: f64,
    pub close_on_signal_flip: bool,
}

/// Time-stop rule parameters (`spec.md` §4.8). `min_hold_ms` gates every
/// rule in the engine, not just this one ("honor minHoldMs (no close
/// before)" applies to the whole evaluation, per the position of the
/// sentence in `spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeStopParams {
    pub max_hold_ms: i64,
    pub min_hold_ms: i64,
}

/// Trailing-stop rule parameters (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrailingParams {
    pub init_arm_pnl_sigmas: f64,
    pub retrace_pct: f64,
}

/// Full rule set for one `ExitEngine`. Any rule can be disabled by
/// leaving it `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ExitParams {
    pub tp_sl_sigma: Option<TpSlSigmaParams>,
    pub fair_value: Option<FairValueParams>,
    pub time_stop: Option<TimeStopParams>,
    pub trailing: Option<TrailingParams>,
}
