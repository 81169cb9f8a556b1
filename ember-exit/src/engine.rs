use crate::order::ExitOrderRequest;
use crate::params::ExitParams;
use crate::position::OpenPosition;
use crate::reason::{ExitReason, FlattenScope};
use ember_core::{Side, SignalAction, TimestampMs};
use std::collections::VecDeque;

/// Floor applied to any sigma denominator, mirroring
/// `ember_strategy::dsl::RollingZScore`'s epsilon floor.
const EPSILON: f64 = 1e-9;

fn opposite_side(side: Side) -> Side {
    match side {
        Side::Buy => Side::Sell,
        Side::Sell => Side::Buy,
    }
}

struct ReturnSample {
    t: TimestampMs,
    ret: f64,
}

/// Evaluates the exit rule set of `spec.md` §4.8 against one open
/// position: TP/SL-sigma, fair-value reversion, time stop, trailing, and
/// risk overrides. One instance tracks one position's lifecycle (armed on
/// `open`, reset on `close`), the way each `smart_trade` rule in the
/// teacher tracks its own state across `update` calls.
pub struct ExitEngine {
    params: ExitParams,
    position: Option<OpenPosition>,
    returns: VecDeque<ReturnSample>,
    last_px: Option<(TimestampMs, f64)>,
    trailing_armed: bool,
    trailing_peak_pnl_sigma: f64,
}

impl ExitEngine {
    pub fn new(params: ExitParams) -> Self {
        Self {
            params,
            position: None,
            returns: VecDeque::new(),
            last_px: None,
            trailing_armed: false,
            trailing_peak_pnl_sigma: 0.0,
        }
    }

    pub fn open(&mut self, position: OpenPosition) {
        self.position = Some(position);
        self.returns.clear();
        self.last_px = None;
        self.trailing_armed = false;
        self.trailing_peak_pnl_sigma = 0.0;
    }

    pub fn close(&mut self) {
        self.position = None;
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    fn min_hold_satisfied(&self, now_ms: TimestampMs, position: &OpenPosition) -> bool {
        match self.params.time_stop {
            Some(ts) => now_ms - position.opened_t >= ts.min_hold_ms,
            None => true,
        }
    }

    fn push_return(&mut self, px: f64, t: TimestampMs) {
        if let Some((_, prev_px)) = self.last_px {
            if prev_px != 0.0 {
                self.returns.push_back(ReturnSample { t, ret: (px - prev_px) / prev_px });
            }
        }
        self.last_px = Some((t, px));

        let lookback = self.params.tp_sl_sigma.map(|p| p.sigma_lookback_ms).unwrap_or(i64::MAX);
        while let Some(front) = self.returns.front() {
            if t - front.t > lookback {
                self.returns.pop_front();
            } else {
                break;
            }
        }
    }

    /// Combined (both-sides) sigma of fractional returns over the current
    /// window.
    fn sigma_combined(&self) -> f64 {
        let n = self.returns.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.returns.iter().map(|r| r.ret).sum::<f64>() / n as f64;
        let var = self.returns.iter().map(|r| (r.ret - mean).powi(2)).sum::<f64>() / n as f64;
        var.sqrt()
    }

    /// Upside/downside semi-deviation, used in `asymmetric` mode so a
    /// favorable-side threshold isn't inflated by adverse volatility and
    /// vice versa.
    fn sigma_semi(&self) -> (f64, f64) {
        let up: Vec<f64> = self.returns.iter().filter(|r| r.ret > 0.0).map(|r| r.ret * r.ret).collect();
        let down: Vec<f64> = self.returns.iter().filter(|r| r.ret < 0.0).map(|r| r.ret * r.ret).collect();
        let semi = |xs: &[f64]| {
            if xs.is_empty() {
                0.0
            } else {
                (xs.iter().sum::<f64>() / xs.len() as f64).sqrt()
            }
        };
        (semi(&up), semi(&down))
    }

    fn request(&self, symbol: &str, position: &OpenPosition, reason: ExitReason, scope: Option<FlattenScope>) -> ExitOrderRequest {
        ExitOrderRequest {
            symbol: symbol.to_string(),
            side: opposite_side(position.side),
            qty: position.qty,
            reason,
            scope,
        }
    }

    /// Feeds a new price observation for the position's trade symbol.
    /// `strategy_fair_px`, when available, is the strategy's latest fair
    /// value used by the fair-value reversion rule.
    pub fn on_price(&mut self, symbol: &str, px: f64, t: TimestampMs, strategy_fair_px: Option<f64>) -> Option<ExitOrderRequest> {
        let position = self.position?;
        self.push_return(px, t);

        if !self.min_hold_satisfied(t, &position) {
            return None;
        }

        if let Some(ts) = self.params.time_stop {
            if t - position.opened_t >= ts.max_hold_ms {
                return Some(self.request(symbol, &position, ExitReason::Time, None));
            }
        }

        if let Some(tpsl) = self.params.tp_sl_sigma {
            let pnl_frac = position.pnl_frac(px);
            if tpsl.asymmetric {
                let (sigma_up, sigma_down) = self.sigma_semi();
                if pnl_frac >= 0.0 && pnl_frac / sigma_up.max(EPSILON) >= tpsl.tp_sigma {
                    return Some(self.request(symbol, &position, ExitReason::Tp, None));
                }
                if pnl_frac < 0.0 && pnl_frac / sigma_down.max(EPSILON) <= -tpsl.sl_sigma {
                    return Some(self.request(symbol, &position, ExitReason::Sl, None));
                }
            } else {
                let sigma = self.sigma_combined().max(EPSILON);
                let pnl_sigma = pnl_frac / sigma;
                if pnl_sigma >= tpsl.tp_sigma {
                    return Some(self.request(symbol, &position, ExitReason::Tp, None));
                }
                if pnl_sigma <= -tpsl.sl_sigma {
                    return Some(self.request(symbol, &position, ExitReason::Sl, None));
                }
            }
        }

        if let Some(fv) = self.params.fair_value {
            if let Some(fair) = strategy_fair_px {
                if fair != 0.0 {
                    let edge_bps = (fair - px).abs() / fair * 10_000.0;
                    if edge_bps <= fv.epsilon_bps {
                        return Some(self.request(symbol, &position, ExitReason::FairValue, None));
                    }
                }
            }
        }

        if let Some(tr) = self.params.trailing {
            let sigma = self.sigma_combined().max(EPSILON);
            let pnl_sigma = position.pnl_frac(px) / sigma;
            if !self.trailing_armed {
                if pnl_sigma >= tr.init_arm_pnl_sigmas {
                    self.trailing_armed = true;
                    self.trailing_peak_pnl_sigma = pnl_sigma;
                }
            } else {
                if pnl_sigma > self.trailing_peak_pnl_sigma {
                    self.trailing_peak_pnl_sigma = pnl_sigma;
                }
                let retrace_floor = self.trailing_peak_pnl_sigma * (1.0 - tr.retrace_pct);
                if pnl_sigma <= retrace_floor {
                    return Some(self.request(symbol, &position, ExitReason::Trailing, None));
                }
            }
        }

        None
    }

    /// Feeds the strategy's latest directional signal; closes on an
    /// opposite-direction signal when `fair_value.close_on_signal_flip`.
    pub fn on_signal(&mut self, symbol: &str, action: SignalAction, t: TimestampMs) -> Option<ExitOrderRequest> {
        let position = self.position?;
        if !self.min_hold_satisfied(t, &position) {
            return None;
        }
        let fv = self.params.fair_value?;
        if !fv.close_on_signal_flip {
            return None;
        }
        let opposite = match position.side {
            Side::Buy => SignalAction::Sell,
            Side::Sell => SignalAction::Buy,
        };
        (action == opposite).then(|| self.request(symbol, &position, ExitReason::SignalFlip, None))
    }

    /// Immediate flatten on a gross/symbol exposure or drawdown breach.
    /// Bypasses `min_hold_ms` — a risk override is a safety action, not a
    /// profit-taking rule.
    pub fn on_risk_breach(&self, symbol: &str, scope: FlattenScope) -> Option<ExitOrderRequest> {
        let position = self.position?;
        Some(self.request(symbol, &position, ExitReason::Risk, Some(scope)))
    }
}
