use crate::bus::Subscription;
use crate::error::StoreError;
use ember_core::{DomainEvent, TimestampMs};

/// Opaque snapshot of a fold over a log prefix (`spec.md` §4.1).
#[derive(Debug, Clone)]
pub struct Snapshot<S> {
    pub id: String,
    pub ts: TimestampMs,
    pub state: S,
}

/// Shared contract for the event log backends (`spec.md` §4.1): an
/// append-only log with idempotent-by-id writes, ascending-`ts` range
/// reads, and a broadcast stream of newly appended events.
///
/// Implementations serialize concurrent `append` calls at the store
/// (`spec.md` §5 "concurrent append calls are serialized at the store").
/// Methods are synchronous by design: the SQLite and in-memory backends
/// are themselves synchronous, and the dedicated persistence-worker
/// thread (`spec.md` §4.2) calls `append` from outside the async runtime,
/// so there is no suspension point to model here — matching the
/// concurrency model in `spec.md` §5 ("suspension points" are limited to
/// venue I/O, store I/O from async callers, and the queue's condvar, none
/// of which live on this trait's signature).
pub trait EventStore: Send + Sync {
    /// Appends a batch of events atomically w.r.t. ordering: events are
    /// validated and written in the order given. Duplicate `id`s already
    /// present in the log are silently dropped (`spec.md` §3). An invalid
    /// event fails the whole batch before anything is written.
    fn append(&self, events: Vec<DomainEvent>) -> Result<(), StoreError>;

    /// Returns all events with `ts` strictly greater than `after` (or all
    /// events if `after` is `None`), in ascending `ts` order.
    fn read(&self, after: Option<TimestampMs>) -> Result<Vec<DomainEvent>, StoreError>;

    /// Subscribes to newly appended events from this point forward.
    fn subscribe(&self) -> Subscription;

    /// Total number of events currently in the log (used for tests and
    /// queue-depth-independent sanity checks).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a snapshot by folding `reduce` over the full log
    /// (`spec.md` §4.1's optional `createSnapshot`). Kept non-generic and
    /// object-safe by folding into `serde_json::Value`; callers downcast
    /// via their own projection's `(de)serialize`.
    fn create_snapshot(
        &self,
        reduce: &dyn Fn(&[DomainEvent]) -> serde_json::Value,
    ) -> Result<Snapshot<serde_json::Value>, StoreError> {
        let events = self.read(None)?;
        let ts = events.last().map(|e| e.ts).unwrap_or(0);
        Ok(Snapshot {
            id: ember_core::EventId::new().to_string(),
            ts,
            state: reduce(&events),
        })
    }

    /// Replaces the log prefix with the snapshot, retaining only events
    /// strictly newer than `snapshot.ts` (`spec.md` §4.1's `restore`).
    fn restore(&self, snapshot: &Snapshot<serde_json::Value>) -> Result<(), StoreError>;
}
