use crate::error::EngineError;
use ember_execution::{CircuitConfig, ReconcilerConfig, RetryPolicy};
use ember_exit::ExitParams;
use ember_intent::IntentPolicy;
use ember_risk::RiskLimits;
use ember_strategy::registry::{ArbitrageParams, MomentumParams, PairParams};
use serde::{Deserialize, Serialize};

/// Whether a strategy's orders are actually submitted to a live venue or
/// only logged and risk-checked without execution (`spec.md` §6's
/// `mode∈{live,sandbox}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyMode {
    Live,
    Sandbox,
}

/// One registry strategy's typed parameters, tagged so a config file can
/// select which implementation a [`StrategyDef`] instantiates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum StrategyParams {
    Momentum(MomentumParams),
    /// `feeds` must name exactly two entries: base then quote.
    Pair(PairParams),
    /// `feeds` must name exactly two entries: primary then secondary.
    Arbitrage(ArbitrageParams),
}

/// One configured strategy instance (`spec.md` §6: "id, type, trade
/// symbol, feeds, params, priority, mode, budget, exit rules").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDef {
    pub id: String,
    pub trade_symbol: String,
    /// For single-feed strategies (momentum), the one symbol it watches.
    /// For multi-leg strategies (pair, arbitrage), the per-leg symbols as
    /// they appear on [`ember_core::MarketTick::symbol`] — the merged
    /// feed stream carries no adapter id, so each leg's adapter must tag
    /// its ticks with a distinct symbol for the engine to tell them apart.
    pub feeds: Vec<String>,
    /// Lower values are wired first; ties break on declaration order.
    /// Only meaningful when strategies compete for the same symbol.
    pub priority: u32,
    pub mode: StrategyMode,
    /// Max notional this strategy's intent builder will size an order up
    /// to; forwarded into its [`IntentPolicy::notional_usd`] override.
    pub budget: f64,
    pub exit: ExitParams,
    pub params: StrategyParams,
}

/// Event store backend selection (`spec.md` §6's "persistence driver and
/// location").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "camelCase")]
pub enum PersistenceConfig {
    Memory,
    Sqlite { path: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    pub capacity: usize,
    pub slot_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 8192, slot_size: 1024 }
    }
}

/// Execution reliability knobs (`spec.md` §6's "execution reliability
/// (retry + circuit + reconciliation)"), applied uniformly to every
/// configured execution adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub fee_bps: f64,
    pub retry: RetryPolicy,
    pub circuit: CircuitConfig,
    pub reconciler: ReconcilerConfig,
}

/// Overrides applied when the same configuration drives a backtest
/// instead of live trading (`spec.md` §6). The replay loop itself lives
/// in `ember-backtest`; these fields only describe how a config authored
/// for live trading maps onto that harness's `BacktestConfig`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestOverrides {
    pub start_ms: Option<i64>,
    pub starting_capital: Option<f64>,
}

/// The engine's validated configuration object (`spec.md` §6). Every
/// field has a documented default at the point it's declared; invalid
/// combinations are caught by [`EngineConfig::validate`] before any
/// component is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub account: String,
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub strategies: Vec<StrategyDef>,
    pub risk_limits: RiskLimits,
    pub intent_policy: IntentPolicy,
    pub execution: ExecutionConfig,
    #[serde(default = "default_worker_shutdown_timeout_ms")]
    pub worker_shutdown_timeout_ms: i64,
    #[serde(default)]
    pub backtest: BacktestOverrides,
}

fn default_worker_shutdown_timeout_ms() -> i64 {
    2000
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.account.trim().is_empty() {
            return Err(EngineError::InvalidConfig("account must not be empty".into()));
        }
        if self.queue.capacity == 0 {
            return Err(EngineError::InvalidConfig("queue.capacity must be > 0".into()));
        }
        if self.queue.slot_size <= 4 {
            return Err(EngineError::InvalidConfig("queue.slotSize must be > 4".into()));
        }
        if self.strategies.is_empty() {
            return Err(EngineError::InvalidConfig("at least one strategy must be configured".into()));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for def in &self.strategies {
            if !seen_ids.insert(def.id.as_str()) {
                return Err(EngineError::InvalidConfig(format!("duplicate strategy id '{}'", def.id)));
            }
            if def.feeds.is_empty() {
                return Err(EngineError::InvalidConfig(format!("strategy '{}' has no feeds configured", def.id)));
            }
            match &def.params {
                StrategyParams::Momentum(params) => {
                    params.validate().map_err(|e| EngineError::InvalidConfig(format!("strategy '{}': {e}", def.id)))?;
                }
                StrategyParams::Pair(params) => {
                    if def.feeds.len() != 2 {
                        return Err(EngineError::InvalidConfig(format!("pair strategy '{}' requires exactly 2 feeds", def.id)));
                    }
                    params.validate().map_err(|e| EngineError::InvalidConfig(format!("strategy '{}': {e}", def.id)))?;
                }
                StrategyParams::Arbitrage(params) => {
                    if def.feeds.len() != 2 {
                        return Err(EngineError::InvalidConfig(format!("arbitrage strategy '{}' requires exactly 2 feeds", def.id)));
                    }
                    if def.feeds[0] == def.feeds[1] {
                        return Err(EngineError::InvalidConfig(format!("arbitrage strategy '{}' requires two distinct venues", def.id)));
                    }
                    params.validate().map_err(|e| EngineError::InvalidConfig(format!("strategy '{}': {e}", def.id)))?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_intent::IntentMode;
    use std::collections::HashMap;

    fn base_config() -> EngineConfig {
        EngineConfig {
            account: "acct-1".to_string(),
            persistence: PersistenceConfig::Memory,
            queue: QueueConfig::default(),
            strategies: vec![StrategyDef {
                id: "mom-1".to_string(),
                trade_symbol: "SIM".to_string(),
                feeds: vec!["hist".to_string()],
                priority: 0,
                mode: StrategyMode::Sandbox,
                budget: 10_000.0,
                exit: ExitParams::default(),
                params: StrategyParams::Momentum(MomentumParams {
                    fast_window: 5,
                    slow_window: 20,
                    min_consensus: 1,
                    max_skew_ms: 1_000,
                    max_signal_age_ms: 60_000,
                    min_action_interval_ms: 0,
                }),
            }],
            risk_limits: RiskLimits { notional: 1_000_000.0, max_position: 1_000.0, price_bands: HashMap::new(), throttle_window_ms: 1_000, throttle_max_count: 100 },
            intent_policy: IntentPolicy {
                mode: IntentMode::Market,
                min_edge_bps: 0.0,
                taker_fee_bps: 1.0,
                taker_slip_bps: 1.0,
                maker_fee_bps: 0.5,
                adverse_selection_bps: 0.0,
                post_only: false,
                limit_offset_bps: 1.0,
                tick_size: 0.01,
                lot_size: 0.001,
                notional_usd: 1_000.0,
                default_qty: 1.0,
                cooldown_ms: 0,
                dedupe_window_ms: 0,
            },
            execution: ExecutionConfig {
                fee_bps: 2.0,
                retry: RetryPolicy { base_delay_ms: 50, max_delay_ms: 2_000, jitter: 0.2, max_attempts: 5 },
                circuit: CircuitConfig { failure_threshold: 5, cooldown_ms: 30_000, half_open_max_successes: 2 },
                reconciler: ReconcilerConfig { ack_timeout_ms: 5_000, fill_timeout_ms: 30_000, auto_cancel_stale: false },
            },
            worker_shutdown_timeout_ms: 2000,
            backtest: BacktestOverrides::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_account_is_rejected() {
        let mut cfg = base_config();
        cfg.account = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_strategy_ids_are_rejected() {
        let mut cfg = base_config();
        let dup = cfg.strategies[0].clone();
        cfg.strategies.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pair_strategy_requires_two_feeds() {
        let mut cfg = base_config();
        cfg.strategies[0].feeds = vec!["only-one".to_string()];
        cfg.strategies[0].params = StrategyParams::Pair(PairParams { window: 10, entry_z: 2.0, exit_z: 0.5, min_interval_ms: 0, epsilon: 1e-9 });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn arbitrage_strategy_rejects_duplicate_venue_feeds() {
        let mut cfg = base_config();
        cfg.strategies[0].feeds = vec!["X".to_string(), "X".to_string()];
        cfg.strategies[0].params = StrategyParams::Arbitrage(ArbitrageParams { max_age_ms: 1_000, spread_bps: 5.0, min_interval_ms: 0 });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = base_config();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.account, cfg.account);
        assert_eq!(back.strategies.len(), cfg.strategies.len());
    }
}
