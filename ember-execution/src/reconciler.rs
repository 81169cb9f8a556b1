use ember_core::{Clock, EventId, MetricsSink, TimestampMs};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Reconciliation configuration (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReconcilerConfig {
    pub ack_timeout_ms: i64,
    pub fill_timeout_ms: i64,
    /// Whether stale orders are automatically cancelled rather than only
    /// flagged (Open Question in `spec.md` §9, default `false`).
    pub auto_cancel_stale: bool,
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    submitted_at: TimestampMs,
    acked_at: Option<TimestampMs>,
}

/// Result of one reconciliation pass: orders past their ack or fill
/// deadline. The caller decides whether to cancel (`ReconcilerConfig::
/// auto_cancel_stale`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    UnackedPastDeadline,
    UnfilledPastDeadline,
}

/// Background-loop-friendly tracker of orders that left an adapter but
/// have not acknowledged within `ack_timeout_ms`, or acknowledged but
/// unfilled within `fill_timeout_ms` (`spec.md` §4.7). Does not itself
/// spawn a task; the caller drives `sweep` on an interval, the way
/// `PersistenceWorker` is driven by its own loop.
pub struct Reconciler {
    config: ReconcilerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    inflight: Mutex<HashMap<EventId, Tracked>>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, clock: Arc<dyn Clock>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            config,
            clock,
            metrics,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_submitted(&self, order_id: EventId) {
        self.inflight.lock().insert(
            order_id,
            Tracked { submitted_at: self.clock.now_ms(), acked_at: None },
        );
    }

    pub fn on_acked(&self, order_id: EventId) {
        if let Some(tracked) = self.inflight.lock().get_mut(&order_id) {
            tracked.acked_at = Some(self.clock.now_ms());
        }
    }

    /// Called on fill or terminal reject/cancel: the order is no longer
    /// tracked for staleness.
    pub fn on_settled(&self, order_id: EventId) {
        self.inflight.lock().remove(&order_id);
    }

    /// Scans in-flight orders and returns those past their ack or fill
    /// deadline, logging a warning and incrementing a counter for each.
    pub fn sweep(&self) -> Vec<(EventId, StaleReason)> {
        let now = self.clock.now_ms();
        let inflight = self.inflight.lock();
        let mut stale = Vec::new();

        for (&order_id, tracked) in inflight.iter() {
            match tracked.acked_at {
                None if now - tracked.submitted_at > self.config.ack_timeout_ms => {
                    stale.push((order_id, StaleReason::UnackedPastDeadline));
                }
                Some(acked_at) if now - acked_at > self.config.fill_timeout_ms => {
                    stale.push((order_id, StaleReason::UnfilledPastDeadline));
                }
                _ => {}
            }
        }

        for (order_id, reason) in &stale {
            warn!(%order_id, ?reason, auto_cancel = self.config.auto_cancel_stale, "stale order detected");
            self.metrics.incr_counter("execution_reconciliation_stale", &[]);
        }

        stale
    }

    pub fn auto_cancel_stale(&self) -> bool {
        self.config.auto_cancel_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{ManualClock, NoopMetricsSink};

    #[test]
    fn flags_unacked_order_past_deadline() {
        let clock = Arc::new(ManualClock::new(0));
        let reconciler = Reconciler::new(
            ReconcilerConfig { ack_timeout_ms: 100, fill_timeout_ms: 500, auto_cancel_stale: false },
            clock.clone(),
            Arc::new(NoopMetricsSink),
        );
        let id = EventId::new();
        reconciler.on_submitted(id);
        clock.advance_to(200).unwrap();
        let stale = reconciler.sweep();
        assert_eq!(stale, vec![(id, StaleReason::UnackedPastDeadline)]);
    }

    #[test]
    fn acked_order_is_judged_against_fill_timeout() {
        let clock = Arc::new(ManualClock::new(0));
        let reconciler = Reconciler::new(
            ReconcilerConfig { ack_timeout_ms: 100, fill_timeout_ms: 500, auto_cancel_stale: false },
            clock.clone(),
            Arc::new(NoopMetricsSink),
        );
        let id = EventId::new();
        reconciler.on_submitted(id);
        clock.advance_to(50).unwrap();
        reconciler.on_acked(id);
        clock.advance_to(80).unwrap();
        assert!(reconciler.sweep().is_empty());
        clock.advance_to(600).unwrap();
        assert_eq!(reconciler.sweep(), vec![(id, StaleReason::UnfilledPastDeadline)]);
    }

    #[test]
    fn settled_order_is_no_longer_tracked() {
        let clock = Arc::new(ManualClock::new(0));
        let reconciler = Reconciler::new(
            ReconcilerConfig { ack_timeout_ms: 100, fill_timeout_ms: 500, auto_cancel_stale: false },
            clock.clone(),
            Arc::new(NoopMetricsSink),
        );
        let id = EventId::new();
        reconciler.on_submitted(id);
        reconciler.on_settled(id);
        clock.advance_to(1000).unwrap();
        assert!(reconciler.sweep().is_empty());
    }
}
