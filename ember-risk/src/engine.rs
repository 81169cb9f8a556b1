use crate::guards::{AccountExposureGuard, MarketExposureGuard};
use crate::limits::RiskLimits;
use ember_core::{OrderNew, Side};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskCheckResult {
    pub allowed: bool,
    pub reasons: Vec<String>,
}

impl RiskCheckResult {
    fn allow() -> Self {
        Self { allowed: true, reasons: Vec::new() }
    }
}

fn notional_with_fees(order: &OrderNew, ref_px: f64) -> f64 {
    let gross = (order.qty * ref_px).abs();
    let fee_rate = order.meta_f64("expectedFeeBps").unwrap_or(0.0).max(0.0) / 10_000.0;
    gross * (1.0 + fee_rate)
}

fn ref_px(order: &OrderNew) -> f64 {
    order.px.or_else(|| order.meta_f64("execRefPx")).unwrap_or(0.0)
}

/// Pre-trade risk engine (`spec.md` §4.6). Tracks signed exposure per
/// symbol and a rolling window of non-exit approvals for the global
/// throttle; `check` accumulates every violated rule as a reason string
/// rather than short-circuiting, so callers see the full picture.
pub struct PreTradeRisk {
    limits: RiskLimits,
    exposures: HashMap<String, f64>,
    approvals: VecDeque<i64>,
}

impl PreTradeRisk {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            exposures: HashMap::new(),
            approvals: VecDeque::new(),
        }
    }

    pub fn position(&self, symbol: &str) -> f64 {
        *self.exposures.get(symbol).unwrap_or(&0.0)
    }

    fn prune_approvals(&mut self, now_ms: i64) {
        while let Some(&front) = self.approvals.front() {
            if now_ms - front > self.limits.throttle_window_ms {
                self.approvals.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evaluates `order` against every limit, optimistically updating
    /// exposure and consuming guard reservations when allowed
    /// (`spec.md` §4.6). Exit orders (`meta.exit=true`) skip notional,
    /// price-band, throttle, and collateral checks, but still respect
    /// position magnitude.
    pub fn check(
        &mut self,
        order: &OrderNew,
        now_ms: i64,
        mut account_guard: Option<&mut dyn AccountExposureGuard>,
        mut market_guard: Option<&mut dyn MarketExposureGuard>,
    ) -> RiskCheckResult {
        let is_exit = order.is_exit();
        let ref_px = ref_px(order);
        let notional_with_fees = notional_with_fees(order, ref_px);
        let signed_qty = order.qty * order.side.sign();
        let current_pos = self.position(&order.symbol);

        let mut reasons = Vec::new();

        if !is_exit && notional_with_fees > self.limits.notional {
            reasons.push(format!("notional>{}", self.limits.notional));
        }

        if (current_pos + signed_qty).abs() > self.limits.max_position {
            reasons.push(format!("position>{}", self.limits.max_position));
        }

        if !is_exit {
            if let Some((min, max)) = self.limits.price_band(&order.symbol) {
                if ref_px < min || ref_px > max {
                    reasons.push("price-band".to_string());
                }
            }
        }

        if !is_exit {
            self.prune_approvals(now_ms);
            if self.approvals.len() >= self.limits.throttle_max_count {
                reasons.push("throttle".to_string());
            }
        }

        if !is_exit {
            if let Some(guard) = account_guard.as_deref() {
                match order.side {
                    Side::Buy => {
                        if let Some(available) = guard.available_quote(&order.symbol) {
                            if available < notional_with_fees {
                                reasons.push("insufficient-quote".to_string());
                            }
                        }
                    }
                    Side::Sell => {
                        if let Some(available) = guard.available_base(&order.symbol) {
                            if available < order.qty {
                                reasons.push("insufficient-base".to_string());
                            }
                        }
                    }
                }
            }

            if let Some(guard) = market_guard.as_deref_mut() {
                if !guard.check_and_reserve(order, notional_with_fees) {
                    reasons.push("insufficient-balance".to_string());
                }
            }
        }

        if !reasons.is_empty() {
            warn!(symbol = %order.symbol, ?reasons, "order rejected by pre-trade risk");
            return RiskCheckResult { allowed: false, reasons };
        }

        *self.exposures.entry(order.symbol.clone()).or_insert(0.0) += signed_qty;
        if !is_exit {
            self.approvals.push_back(now_ms);
            if let Some(guard) = account_guard {
                match order.side {
                    Side::Buy => guard.reserve_quote(&order.symbol, notional_with_fees),
                    Side::Sell => guard.reserve_base(&order.symbol, order.qty),
                }
            }
        }

        RiskCheckResult::allow()
    }

    /// Reverses the exposure delta (and any guard reservations) applied
    /// by a prior allowed `check`, used when a downstream step rejects
    /// the same order (`spec.md` §4.6).
    pub fn revert(
        &mut self,
        order: &OrderNew,
        account_guard: Option<&mut dyn AccountExposureGuard>,
        market_guard: Option<&mut dyn MarketExposureGuard>,
    ) {
        let signed_qty = order.qty * order.side.sign();
        *self.exposures.entry(order.symbol.clone()).or_insert(0.0) -= signed_qty;

        if order.is_exit() {
            return;
        }

        let ref_px = ref_px(order);
        let notional_with_fees = notional_with_fees(order, ref_px);

        if let Some(guard) = account_guard {
            match order.side {
                Side::Buy => guard.release_quote(&order.symbol, notional_with_fees),
                Side::Sell => guard.release_base(&order.symbol, order.qty),
            }
        }
        if let Some(guard) = market_guard {
            guard.release(order, notional_with_fees);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{OrderType, TimeInForce};
    use std::collections::HashMap as StdHashMap;

    fn limits() -> RiskLimits {
        RiskLimits {
            notional: 1000.0,
            max_position: 10.0,
            price_bands: StdHashMap::new(),
            throttle_window_ms: 60_000,
            throttle_max_count: 3,
        }
    }

    fn order(symbol: &str, side: Side, qty: f64, px: f64) -> OrderNew {
        OrderNew::new(1, symbol, side, qty, OrderType::Market, Some(px), TimeInForce::Ioc, "acct", StdHashMap::new()).unwrap()
    }

    #[test]
    fn rejects_notional_over_limit() {
        let mut risk = PreTradeRisk::new(limits());
        let o = order("SIM", Side::Buy, 100.0, 100.0);
        let result = risk.check(&o, 1, None, None);
        assert!(!result.allowed);
        assert!(result.reasons.iter().any(|r| r.starts_with("notional>")));
    }

    #[test]
    fn throttle_blocks_after_max_count_within_window() {
        let mut risk = PreTradeRisk::new(limits());
        for t in 0..3 {
            let o = order("SIM", Side::Buy, 1.0, 10.0);
            let result = risk.check(&o, t, None, None);
            assert!(result.allowed);
        }
        let o = order("SIM", Side::Buy, 1.0, 10.0);
        let result = risk.check(&o, 3, None, None);
        assert!(!result.allowed);
        assert!(result.reasons.contains(&"throttle".to_string()));
    }

    #[test]
    fn exit_orders_skip_notional_and_throttle() {
        let mut risk = PreTradeRisk::new(limits());
        for t in 0..3 {
            risk.check(&order("SIM", Side::Buy, 1.0, 10.0), t, None, None);
        }
        let mut meta = StdHashMap::new();
        meta.insert("exit".to_string(), serde_json::json!(true));
        let exit_order = OrderNew::new(3, "SIM", Side::Sell, 1.0, OrderType::Market, Some(1_000_000.0), TimeInForce::Ioc, "acct", meta).unwrap();
        let result = risk.check(&exit_order, 3, None, None);
        assert!(result.allowed);
    }

    #[test]
    fn revert_reverses_exposure_delta() {
        let mut risk = PreTradeRisk::new(limits());
        let o = order("SIM", Side::Buy, 5.0, 10.0);
        risk.check(&o, 1, None, None);
        assert_eq!(risk.position("SIM"), 5.0);
        risk.revert(&o, None, None);
        assert_eq!(risk.position("SIM"), 0.0);
    }
}
