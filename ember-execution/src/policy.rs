use crate::adapter::ExecutionAdapter;
use crate::circuit::{Admission, CircuitBreaker, CircuitConfig};
use crate::error::ExecutionError;
use crate::event::ExecutionEvent;
use crate::retry::RetryPolicy;
use ember_core::{Clock, EventId, MetricsSink, OrderNew};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Wraps any [`ExecutionAdapter`] with retry-with-backoff and a per-adapter
/// circuit breaker (`spec.md` §4.7). Circuit state is never shared across
/// adapters/venues (`spec.md` §9 "Circuit breaker granularity").
pub struct PolicyWrapper<A: ExecutionAdapter> {
    inner: A,
    retry: RetryPolicy,
    circuit: Mutex<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
}

impl<A: ExecutionAdapter> PolicyWrapper<A> {
    pub fn new(
        inner: A,
        retry: RetryPolicy,
        circuit: CircuitConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            inner,
            retry,
            circuit: Mutex::new(CircuitBreaker::new(circuit)),
            clock,
            metrics,
        }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Submits `order`, retrying transient failures with backoff and
    /// failing fast while the circuit is open. Fatal adapter errors are
    /// surfaced as an `order.reject` on `events` and returned.
    pub async fn submit(
        &self,
        order: &OrderNew,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError> {
        let adapter_id = self.inner.id().to_string();
        let mut attempt: u32 = 1;

        loop {
            let now = self.clock.now_ms();
            match self.circuit.lock().admit(now) {
                Admission::Refused { retry_at } => {
                    self.metrics.incr_counter("execution_circuit_trips", &[("adapter", &adapter_id)]);
                    return Err(ExecutionError::CircuitOpen { adapter: adapter_id, retry_at });
                }
                Admission::Allowed => {}
            }

            match self.inner.submit(order, events.clone()).await {
                Ok(()) => {
                    self.circuit.lock().on_success();
                    self.metrics.incr_counter("orders_submitted", &[("adapter", &adapter_id)]);
                    return Ok(());
                }
                Err(error) => {
                    self.circuit.lock().on_failure(now);
                    self.metrics.incr_counter("execution_failures", &[("adapter", &adapter_id)]);

                    if !error.is_retryable() {
                        warn!(adapter = %adapter_id, %error, "fatal execution error, rejecting order");
                        let _ = events
                            .send(ExecutionEvent::Reject { order_id: order.id, reason: error.to_string() })
                            .await;
                        return Err(error);
                    }

                    if !self.retry.allows(attempt + 1) {
                        warn!(adapter = %adapter_id, attempt, "execution retry budget exhausted");
                        let _ = events
                            .send(ExecutionEvent::Reject {
                                order_id: order.id,
                                reason: format!("max attempts exceeded: {error}"),
                            })
                            .await;
                        return Err(ExecutionError::MaxAttemptsExceeded { adapter: adapter_id, attempts: attempt });
                    }

                    self.metrics.incr_counter("execution_retries", &[("adapter", &adapter_id)]);
                    info!(adapter = %adapter_id, attempt, %error, "retrying execution submit");
                    let delay = self.retry.delay_for(attempt + 1);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn cancel(
        &self,
        order_id: EventId,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError> {
        self.inner.cancel(order_id, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use async_trait::async_trait;
    use ember_core::{NoopMetricsSink, OrderType, Side, SystemClock, TimeInForce};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        fail_times: AtomicU32,
        retryable: bool,
    }

    #[async_trait]
    impl ExecutionAdapter for FlakyAdapter {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn submit(&self, _order: &OrderNew, _events: mpsc::Sender<ExecutionEvent>) -> Result<(), ExecutionError> {
            let remaining = self.fail_times.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 {
                    None
                } else {
                    Some(n - 1)
                }
            });
            match remaining {
                Ok(_) => Err(if self.retryable {
                    ExecutionError::TransientIo { adapter: "flaky".into(), reason: "timeout".into() }
                } else {
                    ExecutionError::FatalIo { adapter: "flaky".into(), reason: "bad request".into() }
                }),
                Err(_) => Ok(()),
            }
        }

        async fn cancel(&self, _order_id: EventId, _events: mpsc::Sender<ExecutionEvent>) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn order() -> OrderNew {
        OrderNew::new(1, "SIM", Side::Buy, 1.0, OrderType::Market, Some(10.0), TimeInForce::Ioc, "acct", HashMap::new()).unwrap()
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let adapter = FlakyAdapter { fail_times: AtomicU32::new(2), retryable: true };
        let wrapper = PolicyWrapper::new(
            adapter,
            RetryPolicy { base_delay_ms: 1, max_delay_ms: 5, jitter: 0.0, max_attempts: 5 },
            CircuitConfig { failure_threshold: 10, cooldown_ms: 1000, half_open_max_successes: 1 },
            Arc::new(SystemClock),
            Arc::new(NoopMetricsSink),
        );
        let (tx, _rx) = mpsc::channel(8);
        let result = wrapper.submit(&order(), tx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fatal_error_rejects_without_retrying() {
        let adapter = FlakyAdapter { fail_times: AtomicU32::new(10), retryable: false };
        let wrapper = PolicyWrapper::new(
            adapter,
            RetryPolicy { base_delay_ms: 1, max_delay_ms: 5, jitter: 0.0, max_attempts: 5 },
            CircuitConfig { failure_threshold: 10, cooldown_ms: 1000, half_open_max_successes: 1 },
            Arc::new(SystemClock),
            Arc::new(NoopMetricsSink),
        );
        let (tx, mut rx) = mpsc::channel(8);
        let result = wrapper.submit(&order(), tx).await;
        assert!(matches!(result, Err(ExecutionError::FatalIo { .. })));
        assert!(matches!(rx.recv().await.unwrap(), ExecutionEvent::Reject { .. }));
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_and_fails_fast() {
        let adapter = FlakyAdapter { fail_times: AtomicU32::new(100), retryable: true };
        let wrapper = PolicyWrapper::new(
            adapter,
            RetryPolicy { base_delay_ms: 1, max_delay_ms: 2, jitter: 0.0, max_attempts: 1 },
            CircuitConfig { failure_threshold: 1, cooldown_ms: 60_000, half_open_max_successes: 1 },
            Arc::new(SystemClock),
            Arc::new(NoopMetricsSink),
        );
        let (tx, _rx) = mpsc::channel(8);
        let _ = wrapper.submit(&order(), tx.clone()).await;
        let result = wrapper.submit(&order(), tx).await;
        assert!(matches!(result, Err(ExecutionError::CircuitOpen { .. })));
    }
}
