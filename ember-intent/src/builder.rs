use crate::policy::{IntentMode, IntentPolicy};
use ember_core::{Liquidity, MarketTick, OrderNew, OrderType, Side, SignalAction, TimeInForce};
use ember_strategy::StrategySignal;
use std::collections::HashMap;
use tracing::debug;

struct Candidate {
    exec_px: f64,
    edge_bps: f64,
    net_edge_bps: f64,
    gate_bps: f64,
    liquidity: Liquidity,
    order_type: OrderType,
    expected_fee_bps: f64,
}

fn mid(tick: &MarketTick) -> Option<f64> {
    match (tick.bid, tick.ask) {
        (Some(b), Some(a)) => Some((b + a) / 2.0),
        _ => None,
    }
}

fn taker_ref_px(side: Side, tick: &MarketTick) -> Option<f64> {
    match side {
        Side::Buy => tick.ask.or(tick.last).or_else(|| mid(tick)),
        Side::Sell => tick.bid.or(tick.last).or_else(|| mid(tick)),
    }
}

fn maker_anchor_px(side: Side, tick: &MarketTick) -> Option<f64> {
    match side {
        Side::Buy => tick.bid.or_else(|| mid(tick)).or(tick.last),
        Side::Sell => tick.ask.or_else(|| mid(tick)).or(tick.last),
    }
}

fn round_toward_passive(px: f64, side: Side, tick_size: f64) -> f64 {
    if tick_size <= 0.0 {
        return px;
    }
    let ticks = px / tick_size;
    match side {
        Side::Buy => ticks.floor() * tick_size,
        Side::Sell => ticks.ceil() * tick_size,
    }
}

/// Converts [`StrategySignal`]s into executable [`OrderNew`]s against
/// current market microstructure (`spec.md` §4.5).
pub struct IntentBuilder {
    account: String,
    policy: IntentPolicy,
    ticks: HashMap<String, MarketTick>,
    cooldown: HashMap<(String, Side), i64>,
    dedupe: HashMap<String, i64>,
}

impl IntentBuilder {
    pub fn new(account: impl Into<String>, policy: IntentPolicy) -> Self {
        Self {
            account: account.into(),
            policy,
            ticks: HashMap::new(),
            cooldown: HashMap::new(),
            dedupe: HashMap::new(),
        }
    }

    pub fn observe_tick(&mut self, tick: MarketTick) {
        self.ticks.insert(tick.symbol.clone(), tick);
    }

    fn taker_candidate(&self, side: Side, fair_px: f64, tick: &MarketTick) -> Option<Candidate> {
        let sigma = side.sign();
        let ref_px = taker_ref_px(side, tick)?;
        let exec_px = ref_px * (1.0 + sigma * self.policy.taker_slip_bps / 10_000.0);
        if exec_px <= 0.0 {
            return None;
        }
        let edge_bps = sigma * (fair_px - exec_px) / exec_px * 10_000.0;
        let gate_bps = self.policy.taker_required_edge_bps();
        Some(Candidate {
            exec_px,
            edge_bps,
            net_edge_bps: edge_bps - self.policy.taker_fee_bps,
            gate_bps,
            liquidity: Liquidity::Taker,
            order_type: OrderType::Market,
            expected_fee_bps: self.policy.taker_fee_bps,
        })
    }

    fn maker_candidate(&self, side: Side, fair_px: f64, tick: &MarketTick) -> Option<Candidate> {
        let sigma = side.sign();
        let anchor = maker_anchor_px(side, tick)?;
        let offset = anchor * (1.0 - sigma * self.policy.limit_offset_bps / 10_000.0);
        let exec_px = round_toward_passive(offset, side, self.policy.tick_size);
        if exec_px <= 0.0 {
            return None;
        }

        if self.policy.post_only {
            let crosses = match side {
                Side::Buy => tick.ask.is_some_and(|ask| exec_px >= ask),
                Side::Sell => tick.bid.is_some_and(|bid| exec_px <= bid),
            };
            if crosses {
                return None;
            }
        }

        let edge_bps = sigma * (fair_px - exec_px) / exec_px * 10_000.0;
        let gate_bps = self.policy.maker_required_edge_bps();
        Some(Candidate {
            exec_px,
            edge_bps,
            net_edge_bps: edge_bps - self.policy.maker_fee_bps - self.policy.adverse_selection_bps,
            gate_bps,
            liquidity: Liquidity::Maker,
            order_type: OrderType::Limit,
            expected_fee_bps: self.policy.maker_fee_bps,
        })
    }

    fn size(&self, exec_px: f64) -> Option<f64> {
        let raw = if self.policy.notional_usd > 0.0 {
            self.policy.notional_usd / exec_px
        } else {
            self.policy.default_qty
        };
        let lot = self.policy.lot_size;
        let qty = if lot > 0.0 { (raw / lot).floor() * lot } else { raw };
        (qty > 0.0).then_some(qty)
    }

    /// Builds an order for `signal`, or `None` if no tick is cached for
    /// the symbol, no candidate clears its edge gate, or cooldown/dedupe
    /// suppresses emission.
    pub fn build(&mut self, signal: &StrategySignal) -> Option<OrderNew> {
        let tick = self.ticks.get(&signal.symbol)?.clone();
        let side = match signal.action {
            SignalAction::Buy => Side::Buy,
            SignalAction::Sell => Side::Sell,
        };
        let fair_px = signal.px;

        let taker = self.taker_candidate(side, fair_px, &tick).filter(|c| c.edge_bps >= c.gate_bps);
        let maker = self.maker_candidate(side, fair_px, &tick).filter(|c| c.edge_bps >= c.gate_bps);

        let (candidate, ref_type, reason) = match self.policy.mode {
            IntentMode::Market | IntentMode::TakerOnDrift => (taker?, "taker", "taker-edge"),
            IntentMode::Limit => (maker?, "maker", "maker-edge"),
            IntentMode::MakerPreferred => match (taker, maker) {
                (Some(t), Some(m)) if m.net_edge_bps >= t.net_edge_bps => (m, "maker", "maker-preferred-maker"),
                (Some(t), Some(_)) => (t, "taker", "maker-preferred-taker"),
                (None, Some(m)) => (m, "maker", "maker-preferred-maker"),
                (Some(t), None) => (t, "taker", "maker-preferred-taker"),
                (None, None) => return None,
            },
        };

        let qty = self.size(candidate.exec_px)?;

        let cooldown_key = (signal.symbol.clone(), side);
        if let Some(last) = self.cooldown.get(&cooldown_key) {
            if signal.t - last < self.policy.cooldown_ms {
                debug!(symbol = %signal.symbol, ?side, "intent suppressed by cooldown");
                return None;
            }
        }

        let dedupe_key = format!(
            "{}:{:?}:{:?}:{:.8}:{:.8}",
            signal.symbol, side, candidate.order_type, candidate.exec_px, qty
        );
        if let Some(last) = self.dedupe.get(&dedupe_key) {
            if signal.t - last < self.policy.dedupe_window_ms {
                debug!(symbol = %signal.symbol, "intent suppressed by dedupe window");
                return None;
            }
        }

        self.cooldown.insert(cooldown_key, signal.t);
        self.dedupe.insert(dedupe_key.clone(), signal.t);

        let mut meta = HashMap::new();
        meta.insert("mode".into(), serde_json::json!(format!("{:?}", self.policy.mode)));
        meta.insert("reason".into(), serde_json::json!(reason));
        meta.insert("refType".into(), serde_json::json!(ref_type));
        meta.insert("fairPx".into(), serde_json::json!(fair_px));
        meta.insert("execPx".into(), serde_json::json!(candidate.exec_px));
        meta.insert("edgeBps".into(), serde_json::json!(candidate.edge_bps));
        meta.insert("netEdgeBps".into(), serde_json::json!(candidate.net_edge_bps));
        meta.insert("liquidity".into(), serde_json::json!(format!("{:?}", candidate.liquidity)));
        meta.insert("gateBps".into(), serde_json::json!(candidate.gate_bps));
        meta.insert("expectedFeeBps".into(), serde_json::json!(candidate.expected_fee_bps));
        meta.insert("strategyId".into(), serde_json::json!(signal.strategy_id));
        meta.insert("dedupeKey".into(), serde_json::json!(dedupe_key));

        let px = matches!(candidate.order_type, OrderType::Limit).then_some(candidate.exec_px);

        OrderNew::new(
            signal.t,
            signal.symbol.clone(),
            side,
            qty,
            candidate.order_type,
            px,
            TimeInForce::Ioc,
            self.account.clone(),
            meta,
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: IntentMode) -> IntentPolicy {
        IntentPolicy {
            mode,
            min_edge_bps: 1.0,
            taker_fee_bps: 1.0,
            taker_slip_bps: 1.0,
            maker_fee_bps: 0.5,
            adverse_selection_bps: 0.5,
            post_only: false,
            limit_offset_bps: 1.0,
            tick_size: 0.01,
            lot_size: 0.001,
            notional_usd: 100.0,
            default_qty: 1.0,
            cooldown_ms: 0,
            dedupe_window_ms: 0,
        }
    }

    fn tick() -> MarketTick {
        MarketTick::new(1, "SIM", Some(99.0), Some(101.0), Some(100.0), None, None).unwrap()
    }

    fn signal(action: SignalAction, px: f64, t: i64) -> StrategySignal {
        StrategySignal {
            strategy_id: "s".into(),
            symbol: "SIM".into(),
            action,
            px,
            t,
        }
    }

    #[test]
    fn market_mode_emits_taker_order_when_edge_clears() {
        let mut builder = IntentBuilder::new("acct", policy(IntentMode::Market));
        builder.observe_tick(tick());
        let order = builder.build(&signal(SignalAction::Buy, 110.0, 1)).unwrap();
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.side, Side::Buy);
    }

    #[test]
    fn insufficient_edge_suppresses_order() {
        let mut builder = IntentBuilder::new("acct", policy(IntentMode::Market));
        builder.observe_tick(tick());
        assert!(builder.build(&signal(SignalAction::Buy, 100.01, 1)).is_none());
    }

    #[test]
    fn cooldown_suppresses_repeated_same_side_signal() {
        let mut p = policy(IntentMode::Market);
        p.cooldown_ms = 10_000;
        let mut builder = IntentBuilder::new("acct", p);
        builder.observe_tick(tick());
        assert!(builder.build(&signal(SignalAction::Buy, 110.0, 1)).is_some());
        assert!(builder.build(&signal(SignalAction::Buy, 110.0, 2)).is_none());
    }

    #[test]
    fn limit_mode_emits_maker_order_with_price() {
        let mut builder = IntentBuilder::new("acct", policy(IntentMode::Limit));
        builder.observe_tick(tick());
        let order = builder.build(&signal(SignalAction::Buy, 110.0, 1)).unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert!(order.px.is_some());
    }
}
