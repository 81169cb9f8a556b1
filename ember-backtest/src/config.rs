use ember_core::TimestampMs;
use ember_intent::IntentPolicy;
use ember_risk::RiskLimits;

/// Configuration the harness constructs its engine from (`spec.md` §4.9,
/// §6's "backtest-specific overrides"). Every option has a documented
/// default; none are validated here beyond what `IntentPolicy`/
/// `RiskLimits`/`OrderNew` already enforce at construction.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub account: String,
    pub start_ms: TimestampMs,
    pub starting_capital: f64,
    pub execution_fee_bps: f64,
    pub intent_policy: IntentPolicy,
    pub risk_limits: RiskLimits,
}
