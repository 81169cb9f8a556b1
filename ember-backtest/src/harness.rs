use crate::config::BacktestConfig;
use crate::error::BacktestError;
use crate::stats::{BacktestStats, BacktestStatsGenerator, NavPoint};
use crate::strategy::BacktestStrategy;
use ember_core::event::{
    OrderAckPayload, OrderCancelPayload, OrderRejectPayload, PnlAnalyticsPayload, PortfolioSnapshotPayload, RiskCheckPayload,
};
use ember_core::{Clock, DomainEvent, EventKind, ManualClock, MarketTick, MetricsSink, NoopMetricsSink, Position, PriceSource, TimestampMs};
use ember_execution::{ExecutionAdapter, ExecutionEvent, PaperExecutionAdapter};
use ember_intent::IntentBuilder;
use ember_risk::PreTradeRisk;
use ember_store::{EventStore, InMemoryEventStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the harness produced for one backtest run (`spec.md` §4.9's
/// "outputs"): the full event log, the final positions, the per-tick NAV
/// series, and aggregate stats.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub events: Vec<DomainEvent>,
    pub positions: HashMap<String, Position>,
    pub nav_series: Vec<NavPoint>,
    pub stats: BacktestStats,
}

/// Deterministic single-threaded backtest engine (`spec.md` §4.9). Wires
/// a historical tick list, the paper execution adapter, in-memory event
/// store, intent builder, and pre-trade risk into one replay loop driven
/// by a [`ManualClock`] — no real time or OS threads involved, so two
/// runs over the same ticks with the same config produce the same event
/// sequence.
pub struct BacktestHarness {
    config: BacktestConfig,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryEventStore>,
    execution: PaperExecutionAdapter,
    intent: IntentBuilder,
    risk: PreTradeRisk,
    metrics: Arc<dyn MetricsSink>,
    positions: HashMap<String, Position>,
}

impl BacktestHarness {
    pub fn new(config: BacktestConfig) -> Self {
        let clock = Arc::new(ManualClock::new(config.start_ms));
        let execution = PaperExecutionAdapter::new("backtest-paper", config.execution_fee_bps, Arc::clone(&clock) as Arc<dyn Clock>);
        let intent = IntentBuilder::new(config.account.clone(), config.intent_policy.clone());
        let risk = PreTradeRisk::new(config.risk_limits.clone());
        Self {
            config,
            clock,
            store: Arc::new(InMemoryEventStore::new()),
            execution,
            intent,
            risk,
            metrics: Arc::new(NoopMetricsSink),
            positions: HashMap::new(),
        }
    }

    /// Appends `events`, bypassing the shared-memory queue entirely —
    /// the inline, ordering-preserving persistence manager `spec.md`
    /// §4.9 calls for in place of the live `ember_queue` ring buffer.
    fn persist(&self, events: Vec<DomainEvent>, stats: &mut BacktestStatsGenerator) -> Result<(), BacktestError> {
        let n = events.len() as u64;
        self.store.append(events)?;
        stats.record_events(n);
        Ok(())
    }

    fn nav(&self) -> PnlAnalyticsPayload {
        let (realized_gross, fees_paid, unrealized) = self.positions.values().fold((0.0, 0.0, 0.0), |(rg, f, u), p| {
            (rg + p.realized_gross, f + p.fees_paid, u + p.unrealized())
        });
        PnlAnalyticsPayload {
            nav: self.config.starting_capital + realized_gross - fees_paid + unrealized,
            realized_gross,
            fees_paid,
            unrealized,
        }
    }

    /// Sorts `ticks` by `t` ascending and replays them through the
    /// engine: `clock.advance_to(tick.t)`, persist the tick, feed it to
    /// execution/intent, run `strategy`, and push any resulting order
    /// through risk and paper execution. After the last tick, yields
    /// once to let trailing async work settle before producing the
    /// report (`spec.md` §4.9's replay loop).
    pub async fn run(
        &mut self,
        mut ticks: Vec<MarketTick>,
        mut strategy: impl BacktestStrategy,
    ) -> Result<BacktestReport, BacktestError> {
        ticks.sort_by_key(|t| t.t);

        let mut stats = BacktestStatsGenerator::new();
        let mut nav_series = Vec::new();

        for tick in &ticks {
            self.clock.advance_to(tick.t)?;
            let now = self.clock.now_ms();

            self.persist(vec![DomainEvent::new(now, EventKind::MarketTick(tick.clone()))], &mut stats)?;
            stats.record_tick(now);

            if let Some(px) = tick.price_from(PriceSource::Last) {
                self.positions.entry(tick.symbol.clone()).or_insert_with(Position::flat).mark = px;
            }
            self.execution.observe_tick(tick.clone());
            self.intent.observe_tick(tick.clone());

            let Some(signal) = strategy.on_tick(tick, now) else {
                continue;
            };
            self.persist(vec![DomainEvent::new(now, EventKind::StrategySignal(signal.clone()))], &mut stats)?;

            let Some(order) = self.intent.build(&signal) else {
                continue;
            };
            self.persist(vec![DomainEvent::new(now, EventKind::OrderNew(order.clone()))], &mut stats)?;

            let check = self.risk.check(&order, now, None, None);
            self.persist(
                vec![DomainEvent::new(
                    now,
                    EventKind::RiskCheck(RiskCheckPayload {
                        order_id: order.id,
                        allowed: check.allowed,
                        reasons: check.reasons.clone(),
                    }),
                )],
                &mut stats,
            )?;
            if !check.allowed {
                self.persist(
                    vec![DomainEvent::new(
                        now,
                        EventKind::OrderReject(OrderRejectPayload { order_id: order.id, reason: check.reasons.join(",") }),
                    )],
                    &mut stats,
                )?;
                continue;
            }

            let (tx, mut rx) = mpsc::channel(16);
            if let Err(error) = self.execution.submit(&order, tx).await {
                self.metrics.incr_counter("execution_failures", &[("adapter", "backtest-paper")]);
                self.risk.revert(&order, None, None);
                self.persist(
                    vec![DomainEvent::new(
                        now,
                        EventKind::OrderReject(OrderRejectPayload { order_id: order.id, reason: error.to_string() }),
                    )],
                    &mut stats,
                )?;
                continue;
            }

            while let Some(event) = rx.recv().await {
                let now = self.clock.now_ms();
                match event {
                    ExecutionEvent::Ack { order_id, venue_order_id } => {
                        self.persist(
                            vec![DomainEvent::new(now, EventKind::OrderAck(OrderAckPayload { order_id, venue_order_id }))],
                            &mut stats,
                        )?;
                    }
                    ExecutionEvent::Fill(fill) => {
                        let position = self.positions.entry(fill.symbol.clone()).or_insert_with(Position::flat);
                        position.apply_fill(fill.signed_qty(), fill.px, fill.fee.unwrap_or(0.0));
                        position.mark = fill.px;
                        self.persist(vec![DomainEvent::new(now, EventKind::OrderFill(fill))], &mut stats)?;
                    }
                    ExecutionEvent::Reject { order_id, reason } => {
                        self.risk.revert(&order, None, None);
                        self.persist(
                            vec![DomainEvent::new(now, EventKind::OrderReject(OrderRejectPayload { order_id, reason }))],
                            &mut stats,
                        )?;
                    }
                    ExecutionEvent::Cancel { order_id, reason } => {
                        self.persist(
                            vec![DomainEvent::new(now, EventKind::OrderCancel(OrderCancelPayload { order_id, reason }))],
                            &mut stats,
                        )?;
                    }
                }
            }

            let pnl = self.nav();
            self.persist(
                vec![
                    DomainEvent::new(now, EventKind::PortfolioSnapshot(PortfolioSnapshotPayload { positions: self.positions.clone() })),
                    DomainEvent::new(now, EventKind::PnlAnalytics(pnl)),
                ],
                &mut stats,
            )?;
            stats.update_nav(pnl.nav);
            nav_series.push(NavPoint { t: now, nav: pnl.nav });
        }

        tokio::task::yield_now().await;

        Ok(BacktestReport {
            events: self.store.read(None)?,
            positions: self.positions.clone(),
            nav_series,
            stats: stats.generate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{SignalAction, StrategySignalPayload};
    use ember_intent::{IntentMode, IntentPolicy};
    use ember_risk::RiskLimits;
    use ember_strategy::registry::{MomentumParams, MomentumStrategy};
    use std::collections::HashMap as StdHashMap;

    fn config() -> BacktestConfig {
        BacktestConfig {
            account: "backtest".to_string(),
            start_ms: 0,
            starting_capital: 0.0,
            execution_fee_bps: 0.0,
            intent_policy: IntentPolicy {
                mode: IntentMode::Market,
                min_edge_bps: 0.0,
                taker_fee_bps: 0.0,
                taker_slip_bps: 0.0,
                maker_fee_bps: 0.0,
                adverse_selection_bps: 0.0,
                post_only: false,
                limit_offset_bps: 0.0,
                tick_size: 0.0,
                lot_size: 0.0,
                notional_usd: 0.0,
                default_qty: 1.0,
                cooldown_ms: 0,
                dedupe_window_ms: 0,
            },
            risk_limits: RiskLimits {
                notional: 1_000_000.0,
                max_position: 1_000.0,
                price_bands: StdHashMap::new(),
                throttle_window_ms: 0,
                throttle_max_count: 1_000_000,
            },
        }
    }

    fn tick(t: i64, px: f64) -> MarketTick {
        MarketTick::new(t, "SIM", None, None, Some(px), None, None).unwrap()
    }

    #[tokio::test]
    async fn momentum_buy_scenario_emits_one_order_and_fill() {
        // spec.md concrete scenario: ticks 104,103,102,103,104,105 with
        // fast=2, slow=3 emits exactly one BUY at px=105.
        let mut harness = BacktestHarness::new(config());
        let params = MomentumParams {
            fast_window: 2,
            slow_window: 3,
            min_consensus: 1,
            max_skew_ms: 1_000,
            max_signal_age_ms: 60_000,
            min_action_interval_ms: 0,
        };
        let mut strategy = MomentumStrategy::new("m", "SIM", params).unwrap();
        let prices = [104.0, 103.0, 102.0, 103.0, 104.0, 105.0];
        let ticks: Vec<MarketTick> = prices.iter().enumerate().map(|(i, px)| tick(i as i64 * 1000, *px)).collect();

        let report = harness
            .run(ticks, move |t: &MarketTick, now: TimestampMs| strategy.on_tick("hist", t, now))
            .await
            .unwrap();

        let fills: Vec<_> = report
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::OrderFill(_)))
            .collect();
        assert_eq!(fills.len(), 1);
        if let EventKind::OrderFill(fill) = &fills[0].kind {
            assert_eq!(fill.px, 105.0);
        }
        assert_eq!(report.positions["SIM"].pos, 1.0);
    }

    #[tokio::test]
    async fn repeated_runs_over_same_ticks_produce_identical_event_counts() {
        // spec.md concrete scenario 7: deterministic backtest.
        fn ticks() -> Vec<MarketTick> {
            vec![
                tick(1, 100.0),
                tick(2, 99.0),
                tick(3, 98.0),
                tick(4, 105.0),
                tick(5, 104.0),
            ]
        }
        async fn run() -> BacktestReport {
            let mut harness = BacktestHarness::new(config());
            let params = MomentumParams {
                fast_window: 1,
                slow_window: 3,
                min_consensus: 1,
                max_skew_ms: 1_000,
                max_signal_age_ms: 60_000,
                min_action_interval_ms: 0,
            };
            let mut strategy = MomentumStrategy::new("m", "SIM", params).unwrap();
            harness
                .run(ticks(), move |t: &MarketTick, now: TimestampMs| strategy.on_tick("hist", t, now))
                .await
                .unwrap()
        }

        let first = run().await;
        let second = run().await;
        assert_eq!(first.events.len(), second.events.len());
        assert_eq!(first.stats.events_emitted, second.stats.events_emitted);
    }

    #[tokio::test]
    async fn risk_rejection_surfaces_order_reject_and_no_fill() {
        let mut cfg = config();
        cfg.risk_limits.notional = 1.0;
        let mut harness = BacktestHarness::new(cfg);

        let signal = StrategySignalPayload {
            strategy_id: "s".to_string(),
            symbol: "SIM".to_string(),
            action: SignalAction::Buy,
            px: 200.0,
            t: 1,
        };
        let mut emitted = false;
        let report = harness
            .run(vec![tick(1, 100.0)], move |_t: &MarketTick, _now: TimestampMs| {
                if emitted {
                    None
                } else {
                    emitted = true;
                    Some(signal.clone())
                }
            })
            .await
            .unwrap();

        let rejects: Vec<_> = report.events.iter().filter(|e| matches!(e.kind, EventKind::OrderReject(_))).count();
        let fills: Vec<_> = report.events.iter().filter(|e| matches!(e.kind, EventKind::OrderFill(_))).count();
        assert_eq!(rejects, 1);
        assert_eq!(fills, 0);
    }
}
