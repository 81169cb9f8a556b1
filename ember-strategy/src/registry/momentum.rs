use crate::dsl::{CrossDirection, DetectCrossovers, Operator, Sma};
use crate::error::StrategyError;
use crate::signal::StrategySignal;
use ember_core::{MarketTick, PriceSource, SignalAction};
use std::collections::HashMap;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MomentumParams {
    pub fast_window: usize,
    pub slow_window: usize,
    /// Feeds required to agree before a multi-feed signal is emitted.
    /// Ignored (treated as 1) when only one feed is configured.
    pub min_consensus: usize,
    pub max_skew_ms: i64,
    pub max_signal_age_ms: i64,
    pub min_action_interval_ms: i64,
}

impl MomentumParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_window >= self.slow_window {
            return Err(StrategyError::InvalidParams(format!(
                "fastWindow ({}) must be < slowWindow ({})",
                self.fast_window, self.slow_window
            )));
        }
        if self.min_consensus == 0 {
            return Err(StrategyError::InvalidParams("minConsensus must be >= 1".into()));
        }
        Ok(())
    }
}

struct FeedState {
    fast: Sma,
    slow: Sma,
    crossovers: DetectCrossovers,
}

impl FeedState {
    fn new(params: &MomentumParams) -> Self {
        Self {
            fast: Sma::new(params.fast_window),
            slow: Sma::new(params.slow_window),
            crossovers: DetectCrossovers::new(),
        }
    }
}

struct PendingSignal {
    action: SignalAction,
    px: f64,
    t: i64,
}

/// Single- or multi-feed SMA crossover momentum strategy (`spec.md`
/// §4.4). With one feed, emits directly on crossover. With several, a
/// feed's crossover only becomes a signal once `min_consensus` feeds
/// agree within `max_skew_ms` of each other and `max_signal_age_ms` of
/// the latest tick, deduplicated by `min_action_interval_ms`.
pub struct MomentumStrategy {
    strategy_id: String,
    symbol: String,
    params: MomentumParams,
    feeds: HashMap<String, FeedState>,
    pending: HashMap<String, PendingSignal>,
    last_emitted: HashMap<SignalAction, i64>,
}

impl MomentumStrategy {
    pub fn new(strategy_id: impl Into<String>, symbol: impl Into<String>, params: MomentumParams) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            params,
            feeds: HashMap::new(),
            pending: HashMap::new(),
            last_emitted: HashMap::new(),
        })
    }

    pub fn on_tick(&mut self, feed_id: &str, tick: &MarketTick, now_ms: i64) -> Option<StrategySignal> {
        let Some(price) = tick.price_from(PriceSource::Last) else {
            return None;
        };

        let state = self
            .feeds
            .entry(feed_id.to_string())
            .or_insert_with(|| FeedState::new(&self.params));

        let fast = state.fast.push(price);
        let slow = state.slow.push(price);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };

        let direction = state.crossovers.push((fast, slow))?;
        let action = match direction {
            CrossDirection::Above => SignalAction::Buy,
            CrossDirection::Below => SignalAction::Sell,
        };
        self.pending.insert(feed_id.to_string(), PendingSignal { action, px: price, t: tick.t });

        if self.feeds.len() <= 1 || self.params.min_consensus <= 1 {
            return self.try_emit(action, vec![price], tick.t, now_ms);
        }

        let agreeing: Vec<&PendingSignal> = self
            .pending
            .values()
            .filter(|p| p.action == action)
            .collect();
        if agreeing.len() < self.params.min_consensus {
            return None;
        }
        let newest = agreeing.iter().map(|p| p.t).max().unwrap_or(tick.t);
        let all_within_skew = agreeing.iter().all(|p| (newest - p.t).abs() <= self.params.max_skew_ms);
        let all_fresh = agreeing.iter().all(|p| (now_ms - p.t).abs() <= self.params.max_signal_age_ms);
        if !all_within_skew || !all_fresh {
            return None;
        }
        let mean_px = agreeing.iter().map(|p| p.px).sum::<f64>() / agreeing.len() as f64;
        self.try_emit(action, vec![mean_px], tick.t, now_ms)
    }

    fn try_emit(&mut self, action: SignalAction, prices: Vec<f64>, t: i64, now_ms: i64) -> Option<StrategySignal> {
        if let Some(last) = self.last_emitted.get(&action) {
            if now_ms - last < self.params.min_action_interval_ms {
                return None;
            }
        }
        self.last_emitted.insert(action, now_ms);
        let px = prices.iter().sum::<f64>() / prices.len() as f64;
        Some(StrategySignal {
            strategy_id: self.strategy_id.clone(),
            symbol: self.symbol.clone(),
            action,
            px,
            t,
        })
    }
}
