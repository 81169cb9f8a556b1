use crate::bus::{EventBus, Subscription};
use crate::error::StoreError;
use crate::store::{EventStore, Snapshot};
use ember_core::{DomainEvent, TimestampMs};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

/// In-memory [`EventStore`]: an ordered sequence plus a de-dup set on
/// `id` (`spec.md` §4.1). Used for tests and the backtest harness.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    bus: EventBus,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<DomainEvent>,
    seen_ids: HashSet<ember_core::EventId>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, events: Vec<DomainEvent>) -> Result<(), StoreError> {
        for event in &events {
            event.validate()?;
        }

        let mut inner = self.inner.lock();
        for event in events {
            if inner.seen_ids.contains(&event.id) {
                debug!(event_id = %event.id, "duplicate event id, dropping");
                continue;
            }
            inner.seen_ids.insert(event.id);
            inner.events.push(event.clone());
            self.bus.publish(&event);
        }
        Ok(())
    }

    fn read(&self, after: Option<TimestampMs>) -> Result<Vec<DomainEvent>, StoreError> {
        let inner = self.inner.lock();
        let mut out: Vec<DomainEvent> = match after {
            None => inner.events.clone(),
            Some(after) => inner.events.iter().filter(|e| e.ts > after).cloned().collect(),
        };
        out.sort_by_key(|e| e.ts);
        Ok(out)
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    fn restore(&self, snapshot: &Snapshot<serde_json::Value>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.events.retain(|e| e.ts > snapshot.ts);
        inner.seen_ids = inner.events.iter().map(|e| e.id).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{EventKind, MarketTick};

    fn tick_event(ts: i64) -> DomainEvent {
        let tick = MarketTick::new(ts, "SIM", None, None, Some(100.0), None, None).unwrap();
        DomainEvent::new(ts, EventKind::MarketTick(tick))
    }

    #[test]
    fn append_then_read_returns_events_in_ts_order() {
        let store = InMemoryEventStore::new();
        store.append(vec![tick_event(3), tick_event(1), tick_event(2)]).unwrap();
        let read = store.read(None).unwrap();
        let timestamps: Vec<_> = read.iter().map(|e| e.ts).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_id_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let event = tick_event(1);
        store.append(vec![event.clone()]).unwrap();
        store.append(vec![event]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn read_after_excludes_events_at_or_before_cutoff() {
        let store = InMemoryEventStore::new();
        store.append(vec![tick_event(1), tick_event(2), tick_event(3)]).unwrap();
        let read = store.read(Some(2)).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].ts, 3);
    }

    #[test]
    fn invalid_event_fails_whole_batch() {
        let store = InMemoryEventStore::new();
        let bad_tick = ember_core::MarketTick {
            t: 1,
            symbol: "SIM".into(),
            bid: None,
            ask: None,
            last: None,
            bid_size: None,
            ask_size: None,
        };
        let bad_event = DomainEvent::new(1, EventKind::MarketTick(bad_tick));
        let result = store.append(vec![tick_event(0), bad_event]);
        assert!(result.is_err());
        assert_eq!(store.len(), 0);
    }
}
