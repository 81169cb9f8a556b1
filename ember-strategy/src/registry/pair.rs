use crate::error::StrategyError;
use crate::signal::StrategySignal;
use ember_core::SignalAction;
use std::collections::VecDeque;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PairParams {
    pub window: usize,
    pub entry_z: f64,
    pub exit_z: f64,
    pub min_interval_ms: i64,
    pub epsilon: f64,
}

impl PairParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.window < 2 {
            return Err(StrategyError::InvalidParams("window must be >= 2".into()));
        }
        if self.exit_z >= self.entry_z {
            return Err(StrategyError::InvalidParams("exitZ must be < entryZ".into()));
        }
        Ok(())
    }
}

/// Mean-reversion pair strategy over a `base/quote` price ratio
/// (`spec.md` §4.4). Emits SELL when the ratio's z-score exceeds
/// `entry_z`, BUY when it falls below `-entry_z`, at most once per
/// `min_interval_ms`; `last_action` resets once `|z| < exit_z`, which
/// re-arms the strategy for the next excursion.
pub struct PairStrategy {
    strategy_id: String,
    symbol: String,
    params: PairParams,
    ratios: VecDeque<f64>,
    last_action: Option<SignalAction>,
    last_emit_ts: Option<i64>,
}

impl PairStrategy {
    pub fn new(strategy_id: impl Into<String>, symbol: impl Into<String>, params: PairParams) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            params,
            ratios: VecDeque::with_capacity(params.window),
            last_action: None,
            last_emit_ts: None,
        })
    }

    pub fn on_prices(&mut self, base_px: f64, quote_px: f64, t: i64) -> Option<StrategySignal> {
        if quote_px == 0.0 {
            return None;
        }
        let ratio = base_px / quote_px;
        self.ratios.push_back(ratio);
        if self.ratios.len() > self.params.window {
            self.ratios.pop_front();
        }
        if self.ratios.len() < self.params.window {
            return None;
        }

        let mean = self.ratios.iter().sum::<f64>() / self.params.window as f64;
        let variance = self.ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / self.params.window as f64;
        let std = variance.sqrt();
        let z = (ratio - mean) / std.max(self.params.epsilon);

        if z.abs() < self.params.exit_z {
            self.last_action = None;
        }

        let candidate = if z > self.params.entry_z {
            Some(SignalAction::Sell)
        } else if z < -self.params.entry_z {
            Some(SignalAction::Buy)
        } else {
            None
        };

        let action = candidate?;
        if self.last_action == Some(action) {
            return None;
        }
        if let Some(last) = self.last_emit_ts {
            if t - last < self.params.min_interval_ms {
                return None;
            }
        }

        self.last_action = Some(action);
        self.last_emit_ts = Some(t);
        Some(StrategySignal {
            strategy_id: self.strategy_id.clone(),
            symbol: self.symbol.clone(),
            action,
            px: ratio,
            t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PairParams {
        PairParams { window: 5, entry_z: 1.5, exit_z: 0.5, min_interval_ms: 0, epsilon: 1e-9 }
    }

    #[test]
    fn rejects_exit_z_not_less_than_entry_z() {
        let bad = PairParams { exit_z: 2.0, entry_z: 1.0, ..params() };
        assert!(PairStrategy::new("p", "SIM", bad).is_err());
    }

    #[test]
    fn emits_sell_on_positive_excursion() {
        let mut strat = PairStrategy::new("p", "BASEQUOTE", params()).unwrap();
        let mut last = None;
        for (i, ratio) in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0].iter().enumerate() {
            last = strat.on_prices(*ratio, 1.0, i as i64 * 100).or(last);
        }
        assert_eq!(last.unwrap().action, SignalAction::Sell);
    }
}
