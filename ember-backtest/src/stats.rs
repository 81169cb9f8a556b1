use ember_core::TimestampMs;
use serde::{Deserialize, Serialize};

/// One point of the per-tick NAV series, derived from `pnl.analytics`
/// (`spec.md` §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub t: TimestampMs,
    pub nav: f64,
}

/// Incremental max-drawdown tracker, mirroring
/// `jackbot/src/statistic/metric/drawdown/max.rs`'s `init`/`update`/
/// `generate` generator shape: feed points one at a time, no second pass
/// over history required.
#[derive(Debug, Default, Clone, Copy)]
struct MaxDrawdownGenerator {
    peak_nav: f64,
    max_drawdown: f64,
}

impl MaxDrawdownGenerator {
    fn init(nav: f64) -> Self {
        Self { peak_nav: nav, max_drawdown: 0.0 }
    }

    fn update(&mut self, nav: f64) {
        if nav > self.peak_nav {
            self.peak_nav = nav;
        }
        if self.peak_nav != 0.0 {
            let drawdown = (nav - self.peak_nav) / self.peak_nav;
            if drawdown.abs() > self.max_drawdown.abs() {
                self.max_drawdown = drawdown;
            }
        }
    }

    fn generate(&self) -> f64 {
        self.max_drawdown
    }
}

/// Welford's single-pass mean/variance accumulator over per-tick
/// fractional NAV returns, feeding both volatility and Sharpe.
#[derive(Debug, Default, Clone, Copy)]
struct WelfordGenerator {
    count: u64,
    mean: f64,
    m2: f64,
}

impl WelfordGenerator {
    fn update(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    fn population_std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

/// Aggregate backtest stats (`spec.md` §4.9's "ticks/sec, events/sec,
/// event counts, NAV start/end/change/max drawdown/volatility/Sharpe").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    pub ticks_ingested: u64,
    pub events_emitted: u64,
    pub wall_start_ms: TimestampMs,
    pub wall_end_ms: TimestampMs,
    pub ticks_per_sec: f64,
    pub events_per_sec: f64,
    pub nav_start: f64,
    pub nav_end: f64,
    pub nav_change: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

/// Incremental generator accumulating [`BacktestStats`] one NAV point at
/// a time over the replay loop, following the `init`/`update`/`generate`
/// shape the teacher's statistic generators use.
#[derive(Debug)]
pub struct BacktestStatsGenerator {
    ticks_ingested: u64,
    events_emitted: u64,
    nav_start: Option<f64>,
    nav_last: f64,
    drawdown: Option<MaxDrawdownGenerator>,
    returns: WelfordGenerator,
    wall_start_ms: Option<TimestampMs>,
    wall_end_ms: TimestampMs,
}

impl Default for BacktestStatsGenerator {
    fn default() -> Self {
        Self {
            ticks_ingested: 0,
            events_emitted: 0,
            nav_start: None,
            nav_last: 0.0,
            drawdown: None,
            returns: WelfordGenerator::default(),
            wall_start_ms: None,
            wall_end_ms: 0,
        }
    }
}

impl BacktestStatsGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, t: TimestampMs) {
        self.ticks_ingested += 1;
        self.wall_start_ms.get_or_insert(t);
        self.wall_end_ms = t;
    }

    pub fn record_events(&mut self, n: u64) {
        self.events_emitted += n;
    }

    /// Folds in a new NAV observation. The first observation seeds
    /// `nav_start` and the drawdown generator; every later one produces a
    /// fractional return sample fed to the volatility/Sharpe accumulator.
    pub fn update_nav(&mut self, nav: f64) {
        match &mut self.drawdown {
            None => {
                self.drawdown = Some(MaxDrawdownGenerator::init(nav));
                self.nav_start = Some(nav);
            }
            Some(drawdown) => {
                if self.nav_last != 0.0 {
                    self.returns.update((nav - self.nav_last) / self.nav_last);
                }
                drawdown.update(nav);
            }
        }
        self.nav_last = nav;
    }

    pub fn generate(&self) -> BacktestStats {
        let nav_start = self.nav_start.unwrap_or(0.0);
        let nav_end = self.nav_last;
        let volatility = self.returns.population_std_dev();
        let sharpe = if volatility == 0.0 { 0.0 } else { self.returns.mean / volatility };

        let wall_start_ms = self.wall_start_ms.unwrap_or(0);
        let duration_secs = ((self.wall_end_ms - wall_start_ms).max(0) as f64 / 1000.0).max(f64::EPSILON);

        BacktestStats {
            ticks_ingested: self.ticks_ingested,
            events_emitted: self.events_emitted,
            wall_start_ms,
            wall_end_ms: self.wall_end_ms,
            ticks_per_sec: self.ticks_ingested as f64 / duration_secs,
            events_per_sec: self.events_emitted as f64 / duration_secs,
            nav_start,
            nav_end,
            nav_change: nav_end - nav_start,
            max_drawdown: self.drawdown.map(|d| d.generate()).unwrap_or(0.0),
            volatility,
            sharpe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_tracks_largest_peak_to_trough_decline() {
        let mut gen = BacktestStatsGenerator::new();
        gen.update_nav(100.0);
        gen.update_nav(110.0);
        gen.update_nav(88.0);
        gen.update_nav(95.0);
        let stats = gen.generate();
        assert!((stats.max_drawdown - (-0.2)).abs() < 1e-9);
    }

    #[test]
    fn nav_change_is_end_minus_start() {
        let mut gen = BacktestStatsGenerator::new();
        gen.update_nav(100.0);
        gen.update_nav(120.0);
        let stats = gen.generate();
        assert_eq!(stats.nav_start, 100.0);
        assert_eq!(stats.nav_end, 120.0);
        assert_eq!(stats.nav_change, 20.0);
    }

    #[test]
    fn zero_volatility_yields_zero_sharpe_not_nan() {
        let mut gen = BacktestStatsGenerator::new();
        gen.update_nav(100.0);
        gen.update_nav(100.0);
        gen.update_nav(100.0);
        let stats = gen.generate();
        assert_eq!(stats.volatility, 0.0);
        assert_eq!(stats.sharpe, 0.0);
    }
}
