use ember_core::DomainEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

const SUBSCRIBER_CAPACITY: usize = 1024;

/// Fan-out broadcast of newly appended events (`spec.md` §4.1's `stream`).
///
/// A slow subscriber never blocks the producer: `publish` uses
/// `try_send`, and when a subscriber's bounded channel is full the new
/// event is dropped for that subscriber only, incrementing its drop
/// counter (`spec.md`'s documented "drop-newest-for-subscriber" policy —
/// the log itself always retains the event regardless of what any
/// subscriber observed).
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::Sender<DomainEvent>,
    dropped: Arc<AtomicU64>,
}

/// Handle returned by [`EventBus::subscribe`]: the receiving half plus a
/// live counter of events dropped for this subscriber specifically.
#[derive(Debug)]
pub struct Subscription {
    pub rx: mpsc::Receiver<DomainEvent>,
    pub dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.lock().push(Subscriber {
            tx,
            dropped: Arc::clone(&dropped),
        });
        Subscription { rx, dropped }
    }

    /// Publishes `event` to every live subscriber in append order. Dead
    /// subscribers (receiver dropped) are pruned opportunistically.
    pub fn publish(&self, event: &DomainEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(event_id = %event.id, "dropping event for slow event-bus subscriber");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
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

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(&tick_event(1));
        bus.publish(&tick_event(2));

        let first = sub.rx.recv().await.unwrap();
        let second = sub.rx.recv().await.unwrap();
        assert_eq!(first.ts, 1);
        assert_eq!(second.ts, 2);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_without_blocking_publisher() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        for i in 0..(SUBSCRIBER_CAPACITY as i64 + 5) {
            bus.publish(&tick_event(i));
        }
        assert!(sub.dropped.load(Ordering::Relaxed) > 0);
    }
}
