use crate::config::PersistenceConfig;
use crate::error::EngineError;
use ember_core::{DomainEvent, MetricsSink};
use ember_queue::{channel, enqueue_or_fallback, PersistenceWorker, Producer};
use ember_store::EventStore;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Bootstraps the event store and, in front of it, the shared-memory
/// queue and its draining worker (`spec.md` §4.2). Both are process-wide
/// singletons created once here and handed to every collaborator
/// explicitly (`spec.md` §9's "Global mutable state").
pub struct PersistenceHandle {
    pub store: Arc<dyn EventStore>,
    producer: Producer,
    worker: Option<PersistenceWorker>,
    metrics: Arc<dyn MetricsSink>,
    inline_writes: AtomicU64,
}

impl PersistenceHandle {
    pub fn bootstrap(
        persistence: &PersistenceConfig,
        queue_capacity: usize,
        queue_slot_size: usize,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, EngineError> {
        let store: Arc<dyn EventStore> = match persistence {
            PersistenceConfig::Memory => Arc::new(ember_store::InMemoryEventStore::new()),
            #[cfg(feature = "sqlite")]
            PersistenceConfig::Sqlite { path } => {
                Arc::new(ember_store::SqliteEventStore::open(path).map_err(EngineError::Store)?)
            }
            #[cfg(not(feature = "sqlite"))]
            PersistenceConfig::Sqlite { .. } => {
                return Err(EngineError::InvalidConfig("sqlite persistence driver requires the 'sqlite' feature".into()))
            }
        };

        let (producer, consumer) = channel(queue_capacity, queue_slot_size);
        let worker = PersistenceWorker::spawn(consumer, Arc::clone(&store), Arc::clone(&metrics), queue_capacity);

        Ok(Self { store, producer, worker: Some(worker), metrics, inline_writes: AtomicU64::new(0) })
    }

    /// Enqueues `event`, falling back to a synchronous inline store write
    /// when the ring is full (`spec.md` §4.2's "Fallback").
    pub fn persist(&self, event: DomainEvent) -> Result<(), EngineError> {
        enqueue_or_fallback(&self.producer, self.store.as_ref(), self.metrics.as_ref(), &self.inline_writes, event)
            .map_err(EngineError::Store)
    }

    pub fn inline_writes(&self) -> u64 {
        self.inline_writes.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Signals the queue to drain; pairs with [`PersistenceHandle::take_worker`]
    /// so the caller can join the worker thread off the async executor
    /// (`spec.md` §5's cancellation: "drains and joins the persistence
    /// worker within `workerShutdownTimeoutMs` ... or force-terminates").
    pub fn signal_shutdown(&self) {
        self.producer.signal_shutdown();
    }

    /// Takes the worker so it can be joined on a blocking thread. Returns
    /// `None` if already taken.
    pub fn take_worker(&mut self) -> Option<PersistenceWorker> {
        self.worker.take()
    }

    /// Synchronous shutdown for non-async callers (e.g. `Drop`): signals
    /// and joins inline, blocking the calling thread until the worker
    /// drains.
    pub fn shutdown(&mut self) {
        self.signal_shutdown();
        if let Some(worker) = self.take_worker() {
            worker.join();
        }
    }
}

impl Drop for PersistenceHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}
