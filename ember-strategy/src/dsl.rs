//! Streaming DSL primitives (`spec.md` §4.4). Each primitive is a
//! stateful push-combinator rather than a `futures::Stream`: state lives
//! in the combinator instance, not in globals, and a primitive only
//! produces a value once its internal window condition is satisfied —
//! the cold-observable laziness the spec describes, expressed as "no
//! output until ready" rather than as deferred subscription.
use ember_core::{MarketTick, PriceSource};
use std::collections::VecDeque;

/// A single step of a streaming pipeline: push one input, get zero or
/// one output.
pub trait Operator<In> {
    type Out;
    fn push(&mut self, input: In) -> Option<Self::Out>;
}

pub struct FilterSymbol {
    symbol: String,
}

impl FilterSymbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into().to_uppercase() }
    }
}

impl Operator<MarketTick> for FilterSymbol {
    type Out = MarketTick;
    fn push(&mut self, input: MarketTick) -> Option<MarketTick> {
        (input.symbol == self.symbol).then_some(input)
    }
}

pub struct PriceFromTick {
    source: PriceSource,
}

impl PriceFromTick {
    pub fn new(source: PriceSource) -> Self {
        Self { source }
    }
}

impl Operator<MarketTick> for PriceFromTick {
    type Out = f64;
    fn push(&mut self, input: MarketTick) -> Option<f64> {
        input.price_from(self.source)
    }
}

/// Emits the current window only once it is full (`spec.md` §4.4).
pub struct SlidingWindow<T> {
    buf: VecDeque<T>,
    capacity: usize,
    step: usize,
    since_last_emit: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize, step: usize) -> Self {
        assert!(capacity > 0, "sliding window capacity must be positive");
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            step: step.max(1),
            since_last_emit: 0,
        }
    }
}

impl<T: Clone> Operator<T> for SlidingWindow<T> {
    type Out = Vec<T>;
    fn push(&mut self, input: T) -> Option<Vec<T>> {
        self.buf.push_back(input);
        if self.buf.len() > self.capacity {
            self.buf.pop_front();
        }
        if self.buf.len() < self.capacity {
            return None;
        }
        self.since_last_emit += 1;
        if self.since_last_emit % self.step != 0 {
            return None;
        }
        Some(self.buf.iter().cloned().collect())
    }
}

/// Simple moving average over the last `n` inputs.
pub struct Sma {
    window: VecDeque<f64>,
    n: usize,
    sum: f64,
}

impl Sma {
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "sma window must be positive");
        Self { window: VecDeque::with_capacity(n), n, sum: 0.0 }
    }
}

impl Operator<f64> for Sma {
    type Out = f64;
    fn push(&mut self, input: f64) -> Option<f64> {
        self.window.push_back(input);
        self.sum += input;
        if self.window.len() > self.n {
            self.sum -= self.window.pop_front().unwrap();
        }
        if self.window.len() < self.n {
            return None;
        }
        Some(self.sum / self.n as f64)
    }
}

/// Exponential moving average. The first input becomes the first
/// output unchanged (`spec.md` §4.4).
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ema period must be positive");
        Self { alpha: 2.0 / (period as f64 + 1.0), value: None }
    }
}

impl Operator<f64> for Ema {
    type Out = f64;
    fn push(&mut self, input: f64) -> Option<f64> {
        let next = match self.value {
            None => input,
            Some(prev) => self.alpha * input + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Simple,
    Log,
}

/// Pairwise returns: the first input produces no output since there is
/// no prior value to compare against.
pub struct Returns {
    kind: ReturnKind,
    prev: Option<f64>,
}

impl Returns {
    pub fn new(kind: ReturnKind) -> Self {
        Self { kind, prev: None }
    }
}

impl Operator<f64> for Returns {
    type Out = f64;
    fn push(&mut self, input: f64) -> Option<f64> {
        let out = self.prev.map(|prev| match self.kind {
            ReturnKind::Simple => (input - prev) / prev,
            ReturnKind::Log => (input / prev).ln(),
        });
        self.prev = Some(input);
        out
    }
}

fn mean_and_std(window: &VecDeque<f64>) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub struct RollingStdDev {
    window: VecDeque<f64>,
    n: usize,
}

impl RollingStdDev {
    pub fn new(n: usize) -> Self {
        assert!(n > 1, "rolling stddev window must be at least 2");
        Self { window: VecDeque::with_capacity(n), n }
    }
}

impl Operator<f64> for RollingStdDev {
    type Out = f64;
    fn push(&mut self, input: f64) -> Option<f64> {
        self.window.push_back(input);
        if self.window.len() > self.n {
            self.window.pop_front();
        }
        if self.window.len() < self.n {
            return None;
        }
        Some(mean_and_std(&self.window).1)
    }
}

/// z-score with a floor on the denominator to avoid dividing by a
/// near-zero standard deviation (`spec.md` §4.4's `rollingZScore`).
pub struct RollingZScore {
    window: VecDeque<f64>,
    n: usize,
    epsilon: f64,
}

impl RollingZScore {
    pub fn new(n: usize, epsilon: f64) -> Self {
        assert!(n > 1, "rolling z-score window must be at least 2");
        Self { window: VecDeque::with_capacity(n), n, epsilon }
    }
}

impl Operator<f64> for RollingZScore {
    type Out = f64;
    fn push(&mut self, input: f64) -> Option<f64> {
        self.window.push_back(input);
        if self.window.len() > self.n {
            self.window.pop_front();
        }
        if self.window.len() < self.n {
            return None;
        }
        let (mean, std) = mean_and_std(&self.window);
        Some((input - mean) / std.max(self.epsilon))
    }
}

pub struct RollingMinMax {
    window: VecDeque<f64>,
    n: usize,
}

impl RollingMinMax {
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "rolling min/max window must be positive");
        Self { window: VecDeque::with_capacity(n), n }
    }
}

impl Operator<f64> for RollingMinMax {
    type Out = (f64, f64);
    fn push(&mut self, input: f64) -> Option<(f64, f64)> {
        self.window.push_back(input);
        if self.window.len() > self.n {
            self.window.pop_front();
        }
        if self.window.len() < self.n {
            return None;
        }
        let min = self.window.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self.window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossDirection {
    Above,
    Below,
}

/// Detects `{fast, slow}` crossovers (`spec.md` §4.4). `CROSS_ABOVE` when
/// `prev.fast - prev.slow <= 0` and `curr.fast - curr.slow > 0`, and
/// symmetrically for `CROSS_BELOW`.
pub struct DetectCrossovers {
    prev: Option<(f64, f64)>,
}

impl DetectCrossovers {
    pub fn new() -> Self {
        Self { prev: None }
    }
}

impl Default for DetectCrossovers {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator<(f64, f64)> for DetectCrossovers {
    type Out = CrossDirection;
    fn push(&mut self, input: (f64, f64)) -> Option<CrossDirection> {
        let (fast, slow) = input;
        let out = self.prev.and_then(|(pf, ps)| {
            let prev_diff = pf - ps;
            let curr_diff = fast - slow;
            if prev_diff <= 0.0 && curr_diff > 0.0 {
                Some(CrossDirection::Above)
            } else if prev_diff >= 0.0 && curr_diff < 0.0 {
                Some(CrossDirection::Below)
            } else {
                None
            }
        });
        self.prev = Some((fast, slow));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_emits_only_once_window_full() {
        let mut sma = Sma::new(3);
        assert_eq!(sma.push(1.0), None);
        assert_eq!(sma.push(2.0), None);
        assert_eq!(sma.push(3.0), Some(2.0));
        assert_eq!(sma.push(6.0), Some((2.0 + 3.0 + 6.0) / 3.0));
    }

    #[test]
    fn ema_first_value_equals_input() {
        let mut ema = Ema::new(5);
        assert_eq!(ema.push(10.0), Some(10.0));
        let second = ema.push(20.0).unwrap();
        assert!(second > 10.0 && second < 20.0);
    }

    #[test]
    fn crossover_detects_above_and_below() {
        let mut detector = DetectCrossovers::new();
        assert_eq!(detector.push((1.0, 2.0)), None);
        assert_eq!(detector.push((3.0, 2.0)), Some(CrossDirection::Above));
        assert_eq!(detector.push((1.0, 2.0)), Some(CrossDirection::Below));
    }

    #[test]
    fn z_score_uses_epsilon_floor() {
        let mut z = RollingZScore::new(3, 1e-6);
        z.push(1.0);
        z.push(1.0);
        let out = z.push(1.0).unwrap();
        assert!(out.is_finite());
    }
}
