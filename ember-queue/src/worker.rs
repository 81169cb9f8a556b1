use crate::ring::Consumer;
use ember_core::MetricsSink;
use ember_store::EventStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// High/low watermark fractions of capacity (`spec.md` §4.2).
pub const HIGH_WATERMARK_FRACTION: f64 = 0.8;
pub const LOW_WATERMARK_FRACTION: f64 = 0.56;

const DEFAULT_BATCH_SIZE: usize = 256;
const DEFAULT_WAIT_MS: u64 = 50;
const WATERMARK_CHECK_EVERY: u32 = 20;

/// Drains the shared-memory ring on its own OS thread and writes batches
/// to the event store, so tick-to-trade latency is never bounded by
/// store I/O (`spec.md` §4.2). On a store error the batch is logged and
/// the worker keeps looping rather than exiting — a poisoned store must
/// not silently stop persistence.
pub struct PersistenceWorker {
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn(
        consumer: Consumer,
        store: Arc<dyn EventStore>,
        metrics: Arc<dyn MetricsSink>,
        capacity: usize,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("ember-persistence-worker".into())
            .spawn(move || run(consumer, store, metrics, capacity))
            .expect("failed to spawn persistence worker thread");

        Self {
            handle: Some(handle),
        }
    }

    /// Joins the worker thread, blocking until it drains and exits. The
    /// caller is responsible for signalling shutdown on the producer
    /// first (`spec.md` §5's `workerShutdownTimeoutMs`) and enforcing a
    /// timeout around this call if one is required.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(consumer: Consumer, store: Arc<dyn EventStore>, metrics: Arc<dyn MetricsSink>, capacity: usize) {
    info!("persistence worker started");
    let mut above_high_watermark = false;
    let mut iterations: u32 = 0;

    loop {
        let batch = consumer.dequeue_batch(DEFAULT_BATCH_SIZE, DEFAULT_WAIT_MS);
        if !batch.is_empty() {
            let n = batch.len();
            if let Err(error) = store.append(batch) {
                warn!(?error, "persistence worker failed to append batch, continuing");
                metrics.incr_counter("persistence_append_errors", &[]);
            } else {
                metrics.observe_histogram("event_store_append_duration_seconds", 0.0, &[("driver", "queued")]);
                metrics.incr_counter("events_persisted", &[]);
                let _ = n;
            }
        }

        iterations += 1;
        if iterations % WATERMARK_CHECK_EVERY == 0 {
            let depth = consumer.depth();
            let high = (capacity as f64 * HIGH_WATERMARK_FRACTION) as usize;
            let low = (capacity as f64 * LOW_WATERMARK_FRACTION) as usize;
            metrics.set_gauge("persistence_queue_depth", depth as f64, &[]);

            if !above_high_watermark && depth >= high {
                above_high_watermark = true;
                warn!(depth, capacity, "persistence queue depth crossed high watermark");
            } else if above_high_watermark && depth <= low {
                above_high_watermark = false;
                info!(depth, capacity, "persistence queue depth cleared low watermark");
            }
        }

        if batch.is_empty() && consumer.is_shutdown() {
            let remainder = consumer.dequeue_batch(usize::MAX, 0);
            if !remainder.is_empty() {
                if let Err(error) = store.append(remainder) {
                    warn!(?error, "persistence worker failed to append final drain batch");
                }
            }
            info!("persistence worker draining complete, exiting");
            return;
        }
    }
}

/// Producer-side fallback helper (`spec.md` §4.2's "Fallback"): attempts
/// the ring-buffer `enqueue`, and if the ring is full, writes directly
/// to the store, incrementing `inline_writes` and the matching metric.
pub fn enqueue_or_fallback(
    producer: &crate::ring::Producer,
    store: &dyn EventStore,
    metrics: &dyn MetricsSink,
    inline_writes: &AtomicU64,
    event: ember_core::DomainEvent,
) -> Result<(), ember_store::StoreError> {
    match producer.enqueue(&event) {
        Ok(true) => Ok(()),
        Ok(false) => {
            inline_writes.fetch_add(1, Ordering::Relaxed);
            metrics.incr_counter("persistence_queue_drops", &[]);
            metrics.incr_counter("persistence_inline_writes", &[]);
            warn!(event_id = %event.id, "persistence queue full, writing inline");
            store.append(vec![event])
        }
        Err(error) => {
            warn!(?error, "failed to serialize event for queue, writing inline");
            inline_writes.fetch_add(1, Ordering::Relaxed);
            metrics.incr_counter("persistence_inline_writes", &[]);
            store.append(vec![event])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::channel;
    use ember_core::{EventKind, MarketTick, NoopMetricsSink};
    use ember_store::InMemoryEventStore;
    use std::time::Duration as StdDuration;

    fn tick_event(ts: i64) -> ember_core::DomainEvent {
        let tick = MarketTick::new(ts, "SIM", None, None, Some(100.0), None, None).unwrap();
        ember_core::DomainEvent::new(ts, EventKind::MarketTick(tick))
    }

    #[test]
    fn worker_drains_queue_into_store() {
        let (producer, consumer) = channel(64, 256);
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetricsSink);

        for i in 0..10 {
            producer.enqueue(&tick_event(i)).unwrap();
        }

        let worker = PersistenceWorker::spawn(consumer, Arc::clone(&store), metrics, 64);
        thread::sleep(StdDuration::from_millis(150));
        producer.signal_shutdown();
        worker.join();

        assert_eq!(store.len(), 10);
    }

    #[test]
    fn fallback_persists_inline_when_ring_is_full() {
        let (producer, _consumer) = channel(1, 256);
        let store = InMemoryEventStore::new();
        let metrics = NoopMetricsSink;
        let inline_writes = AtomicU64::new(0);

        enqueue_or_fallback(&producer, &store, &metrics, &inline_writes, tick_event(1)).unwrap();
        enqueue_or_fallback(&producer, &store, &metrics, &inline_writes, tick_event(2)).unwrap();

        assert_eq!(inline_writes.load(Ordering::Relaxed), 1);
        assert_eq!(store.len(), 2);
    }
}
