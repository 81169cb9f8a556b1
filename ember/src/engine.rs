use crate::config::{EngineConfig, StrategyDef, StrategyMode};
use crate::error::EngineError;
use crate::persistence::PersistenceHandle;
use crate::strategy_unit::StrategyUnit;
use ember_core::event::{
    OrderAckPayload, OrderCancelPayload, OrderRejectPayload, PnlAnalyticsPayload, PortfolioSnapshotPayload, RiskCheckPayload,
};
use ember_core::{DomainEvent, EventKind, MetricsSink, NoopMetricsSink, Position, PriceSource, SystemClock};
use ember_exit::ExitEngine;
use ember_feed::FeedManager;
use ember_intent::IntentBuilder;
use ember_risk::PreTradeRisk;
use ember_execution::{ExecutionAdapter, ExecutionEvent, PaperExecutionAdapter, PolicyWrapper};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One strategy's fully wired pipeline: its multiplexing unit, a private
/// intent builder and pre-trade risk (never shared across strategies,
/// per `spec.md` §9), and the exit rules for its trade symbol.
struct StrategyPipeline {
    def: StrategyDef,
    unit: StrategyUnit,
    intent: IntentBuilder,
    risk: PreTradeRisk,
    exit: ExitEngine,
}

/// Multi-component live trading engine (`spec.md` §4's full pipeline),
/// generalizing the teacher's per-market `Trader` into one process
/// driving an arbitrary number of configured strategies off a shared
/// [`FeedManager`] tick stream, a shared [`PolicyWrapper`]-guarded
/// execution adapter, and one persistence pipeline.
pub struct Engine<A: ExecutionAdapter> {
    account: String,
    feeds: FeedManager,
    execution: Arc<PolicyWrapper<A>>,
    persistence: PersistenceHandle,
    metrics: Arc<dyn MetricsSink>,
    positions: HashMap<String, Position>,
    pipelines: Vec<StrategyPipeline>,
    running: Arc<AtomicBool>,
}

impl<A: ExecutionAdapter + 'static> Engine<A> {
    /// Wires every component from `config`. `execution` is the venue (or
    /// [`PaperExecutionAdapter`]) this engine submits orders through,
    /// wrapped in the retry/circuit policy from `config.execution`.
    pub fn new(config: EngineConfig, feeds: FeedManager, execution: A) -> Result<Self, EngineError> {
        config.validate()?;
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetricsSink);
        let clock = Arc::new(SystemClock);

        let persistence = PersistenceHandle::bootstrap(&config.persistence, config.queue.capacity, config.queue.slot_size, Arc::clone(&metrics))?;

        let execution = Arc::new(PolicyWrapper::new(
            execution,
            config.execution.retry,
            config.execution.circuit,
            clock,
            Arc::clone(&metrics),
        ));

        let mut pipelines = Vec::with_capacity(config.strategies.len());
        for def in config.strategies.iter().cloned() {
            let unit = StrategyUnit::build(&def)?;
            let mut policy = config.intent_policy.clone();
            policy.notional_usd = policy.notional_usd.min(def.budget);
            let intent = IntentBuilder::new(config.account.clone(), policy);
            let risk = PreTradeRisk::new(config.risk_limits.clone());
            let exit = ExitEngine::new(def.exit);
            pipelines.push(StrategyPipeline { def, unit, intent, risk, exit });
        }

        Ok(Self {
            account: config.account,
            feeds,
            execution,
            persistence,
            metrics,
            positions: HashMap::new(),
            pipelines,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A clone-able handle that, when set to `false`, stops [`Engine::run`]
    /// after its current tick finishes processing.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    fn persist(&self, now: i64, kind: EventKind) {
        if let Err(error) = self.persistence.persist(DomainEvent::new(now, kind)) {
            warn!(?error, "failed to persist event");
        }
    }

    /// Drains the merged feed tick stream until `running_flag()` is
    /// cleared or the feed channel closes, running every configured
    /// strategy's pipeline on each tick (`spec.md` §4's end-to-end flow:
    /// tick → signal → intent → risk → execution → exit → persistence).
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.feeds.start();
        let Some(mut marks) = self.feeds.marks() else {
            return Err(EngineError::InvalidConfig("feed manager's tick stream was already taken".into()));
        };

        while self.running.load(Ordering::Acquire) {
            let Some(tick) = marks.recv().await else {
                break;
            };
            let now = tick.t;
            self.metrics.incr_counter("ticks_ingested", &[]);
            self.persist(now, EventKind::MarketTick(tick.clone()));

            if let Some(px) = tick.price_from(PriceSource::Last) {
                let position = self.positions.entry(tick.symbol.clone()).or_insert_with(Position::flat);
                position.mark = px;
                self.metrics.set_gauge("portfolio_nav", self.nav(), &[]);
                if let Some(exit_order) = self.exit_for(&tick.symbol).and_then(|e| e.on_price(&tick.symbol, px, now, None)) {
                    self.submit_exit(exit_order, now).await;
                }
            }

            for idx in 0..self.pipelines.len() {
                // The merged `marks` stream carries no originating adapter
                // id (`spec.md` §4.3's `marks` is a plain tick stream), so
                // multi-leg strategies (pair, arbitrage) key off the
                // tick's own instrument symbol rather than a feed id —
                // each leg's adapter must emit ticks under a distinct
                // `symbol` (e.g. `"BTC-BINANCE"` vs `"BTC-COINBASE"`).
                let Some(signal) = self.pipelines[idx].unit.on_tick(&tick.symbol, &tick, now) else {
                    continue;
                };
                self.persist(now, EventKind::StrategySignal(signal.clone()));

                if let Some(exit_order) = self.pipelines[idx].exit.on_signal(&signal.symbol, signal.action, now) {
                    self.submit_exit(exit_order, now).await;
                }

                if self.pipelines[idx].def.mode == StrategyMode::Sandbox {
                    info!(strategy = %self.pipelines[idx].def.id, action = ?signal.action, "sandbox strategy signal, not executing");
                    continue;
                }

                let Some(order) = self.pipelines[idx].intent.build(&signal) else {
                    continue;
                };
                self.persist(now, EventKind::OrderNew(order.clone()));

                let check = self.pipelines[idx].risk.check(&order, now, None, None);
                self.persist(
                    now,
                    EventKind::RiskCheck(RiskCheckPayload { order_id: order.id, allowed: check.allowed, reasons: check.reasons.clone() }),
                );
                if !check.allowed {
                    self.metrics.incr_counter("risk_rejected", &[]);
                    self.persist(now, EventKind::OrderReject(OrderRejectPayload { order_id: order.id, reason: check.reasons.join(",") }));
                    continue;
                }

                self.submit(idx, order, now).await;
            }
        }

        Ok(())
    }

    fn exit_for(&mut self, symbol: &str) -> Option<&mut ExitEngine> {
        self.pipelines.iter_mut().find(|p| p.def.trade_symbol == symbol).map(|p| &mut p.exit)
    }

    async fn submit(&mut self, idx: usize, order: ember_core::OrderNew, now: i64) {
        let (tx, mut rx) = mpsc::channel(16);
        if let Err(error) = self.execution.submit(&order, tx).await {
            self.pipelines[idx].risk.revert(&order, None, None);
            self.persist(now, EventKind::OrderReject(OrderRejectPayload { order_id: order.id, reason: error.to_string() }));
            return;
        }

        while let Some(event) = rx.recv().await {
            self.apply_execution_event(idx, event, now);
        }
    }

    async fn submit_exit(&mut self, request: ember_exit::ExitOrderRequest, now: i64) {
        let Ok(order) = request.into_order(now, self.account.clone()) else {
            return;
        };
        self.persist(now, EventKind::OrderNew(order.clone()));
        let (tx, mut rx) = mpsc::channel(16);
        if self.execution.submit(&order, tx).await.is_ok() {
            while let Some(event) = rx.recv().await {
                self.apply_execution_event_untracked(event, now);
            }
        }
    }

    fn apply_execution_event(&mut self, idx: usize, event: ExecutionEvent, now: i64) {
        match event {
            ExecutionEvent::Ack { order_id, venue_order_id } => {
                self.persist(now, EventKind::OrderAck(OrderAckPayload { order_id, venue_order_id }));
            }
            ExecutionEvent::Fill(fill) => {
                let position = self.positions.entry(fill.symbol.clone()).or_insert_with(Position::flat);
                position.apply_fill(fill.signed_qty(), fill.px, fill.fee.unwrap_or(0.0));
                position.mark = fill.px;
                let snapshot = position.clone();
                self.pipelines[idx].exit.open(ember_exit::OpenPosition {
                    side: if snapshot.pos >= 0.0 { ember_core::Side::Buy } else { ember_core::Side::Sell },
                    qty: snapshot.pos.abs(),
                    entry_px: snapshot.avg_px,
                    opened_t: now,
                });
                self.persist(now, EventKind::OrderFill(fill));
                self.snapshot_and_persist(now);
            }
            ExecutionEvent::Reject { order_id, reason } => {
                self.metrics.incr_counter("execution_failures", &[]);
                self.persist(now, EventKind::OrderReject(OrderRejectPayload { order_id, reason }));
            }
            ExecutionEvent::Cancel { order_id, reason } => {
                self.persist(now, EventKind::OrderCancel(OrderCancelPayload { order_id, reason }));
            }
        }
    }

    fn apply_execution_event_untracked(&mut self, event: ExecutionEvent, now: i64) {
        match event {
            ExecutionEvent::Ack { order_id, venue_order_id } => {
                self.persist(now, EventKind::OrderAck(OrderAckPayload { order_id, venue_order_id }));
            }
            ExecutionEvent::Fill(fill) => {
                let position = self.positions.entry(fill.symbol.clone()).or_insert_with(Position::flat);
                position.apply_fill(fill.signed_qty(), fill.px, fill.fee.unwrap_or(0.0));
                position.mark = fill.px;
                self.persist(now, EventKind::OrderFill(fill));
                self.snapshot_and_persist(now);
            }
            ExecutionEvent::Reject { order_id, reason } => {
                self.persist(now, EventKind::OrderReject(OrderRejectPayload { order_id, reason }));
            }
            ExecutionEvent::Cancel { order_id, reason } => {
                self.persist(now, EventKind::OrderCancel(OrderCancelPayload { order_id, reason }));
            }
        }
    }

    fn nav(&self) -> f64 {
        self.positions.values().fold(0.0, |acc, p| acc + p.realized_gross - p.fees_paid + p.unrealized())
    }

    fn snapshot_and_persist(&self, now: i64) {
        let (realized_gross, fees_paid, unrealized) = self.positions.values().fold((0.0, 0.0, 0.0), |(rg, f, u), p| {
            (rg + p.realized_gross, f + p.fees_paid, u + p.unrealized())
        });
        self.persist(now, EventKind::PortfolioSnapshot(PortfolioSnapshotPayload { positions: self.positions.clone() }));
        self.persist(now, EventKind::PnlAnalytics(PnlAnalyticsPayload { nav: self.nav(), realized_gross, fees_paid, unrealized }));
    }

    /// Stops feeds, signals the queue, and joins the persistence worker
    /// on a blocking thread, bounded by `worker_shutdown_timeout_ms`
    /// (`spec.md` §5's cancellation model). If the worker doesn't exit
    /// within the timeout it is abandoned rather than force-terminated —
    /// Rust has no safe mechanism to kill a running OS thread.
    pub async fn shutdown(&mut self, worker_shutdown_timeout_ms: i64) {
        self.running.store(false, Ordering::Release);
        self.feeds.stop().await;
        self.persistence.signal_shutdown();

        if let Some(worker) = self.persistence.take_worker() {
            let timeout = std::time::Duration::from_millis(worker_shutdown_timeout_ms.max(0) as u64);
            let joined = tokio::task::spawn_blocking(move || worker.join());
            if tokio::time::timeout(timeout, joined).await.is_err() {
                warn!(worker_shutdown_timeout_ms, "persistence worker did not exit within shutdown timeout, abandoning");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BacktestOverrides, ExecutionConfig, PersistenceConfig, QueueConfig, StrategyParams};
    use ember_core::MarketTick;
    use ember_execution::{CircuitConfig, ReconcilerConfig, RetryPolicy};
    use ember_feed::HistoricalFeedAdapter;
    use ember_intent::{IntentMode, IntentPolicy};
    use ember_risk::RiskLimits;
    use ember_strategy::registry::MomentumParams;
    use std::sync::Arc as StdArc;

    fn config() -> EngineConfig {
        EngineConfig {
            account: "acct".to_string(),
            persistence: PersistenceConfig::Memory,
            queue: QueueConfig { capacity: 256, slot_size: 512 },
            strategies: vec![StrategyDef {
                id: "mom".to_string(),
                trade_symbol: "SIM".to_string(),
                feeds: vec!["hist".to_string()],
                priority: 0,
                mode: StrategyMode::Live,
                budget: 10_000.0,
                exit: ember_exit::ExitParams::default(),
                params: StrategyParams::Momentum(MomentumParams {
                    fast_window: 2,
                    slow_window: 3,
                    min_consensus: 1,
                    max_skew_ms: 1_000,
                    max_signal_age_ms: 60_000,
                    min_action_interval_ms: 0,
                }),
            }],
            risk_limits: RiskLimits { notional: 1_000_000.0, max_position: 1_000.0, price_bands: HashMap::new(), throttle_window_ms: 1_000, throttle_max_count: 1_000 },
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
                notional_usd: 1_000_000.0,
                default_qty: 1.0,
                cooldown_ms: 0,
                dedupe_window_ms: 0,
            },
            execution: ExecutionConfig {
                fee_bps: 0.0,
                retry: RetryPolicy { base_delay_ms: 1, max_delay_ms: 10, jitter: 0.0, max_attempts: 3 },
                circuit: CircuitConfig { failure_threshold: 5, cooldown_ms: 1_000, half_open_max_successes: 1 },
                reconciler: ReconcilerConfig { ack_timeout_ms: 5_000, fill_timeout_ms: 30_000, auto_cancel_stale: false },
            },
            worker_shutdown_timeout_ms: 500,
            backtest: BacktestOverrides::default(),
        }
    }

    #[tokio::test]
    async fn engine_runs_feed_to_fill_and_shuts_down_cleanly() {
        let feeds = FeedManager::new();
        let prices = [104.0, 103.0, 102.0, 103.0, 104.0, 105.0];
        let ticks: Vec<MarketTick> = prices.iter().enumerate().map(|(i, px)| MarketTick::new(i as i64 * 1000, "SIM", None, None, Some(*px), None, None).unwrap()).collect();
        feeds.register(
            StdArc::new(HistoricalFeedAdapter::new("hist", ticks)),
            ember_feed::ReconnectPolicy::new(1, 10, 0, Some(0)),
        );

        let clock = Arc::new(SystemClock);
        let execution = PaperExecutionAdapter::new("paper", 0.0, clock);
        let mut engine = Engine::new(config(), feeds, execution).unwrap();
        let flag = engine.running_flag();

        let handle = tokio::spawn(async move {
            engine.run().await.unwrap();
            engine
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        flag.store(false, Ordering::Release);
        let mut engine = handle.await.unwrap();
        engine.shutdown(500).await;

        assert!(engine.persistence.store.len() > 0);
    }
}
