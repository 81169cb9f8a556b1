use ember_core::DomainEvent;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("serialized event ({0} bytes) exceeds slot capacity")]
    PayloadTooLarge(usize),
    #[error("failed to decode queued event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One fixed-size byte slot. Guarded by the SPSC discipline documented on
/// [`RingBuffer`]: only the producer writes a given slot, only the
/// consumer reads it, and `size` never lets the two sides touch the same
/// slot index at once.
struct Slot(UnsafeCell<Box<[u8]>>);

// SAFETY: `Slot` is shared behind `RingBuffer`, but access is
// disciplined by the single-producer/single-consumer contract: a slot at
// index `i` is written exactly once by the producer before its
// corresponding `size` increment becomes visible to the consumer, and
// read exactly once by the consumer before the slot is eligible to be
// overwritten again (after `capacity` further produces). No two threads
// ever touch the same slot concurrently.
unsafe impl Sync for Slot {}

/// Shared control block + byte ring described in `spec.md` §4.2: a
/// fixed-capacity ring of `capacity * slot_size` bytes plus atomic
/// `head`/`tail`/`size`/`shutdown` counters.
///
/// Memory-ordering model (`spec.md` §9's open question): `head` and
/// `tail` are written by exactly one thread each (consumer and producer
/// respectively) and are never read cross-thread for correctness, so
/// they use `Relaxed`. `size` is the only counter read and written by
/// both sides and is the actual synchronization point: the producer
/// writes the slot's bytes, then publishes with
/// `size.fetch_add(1, Release)`; the consumer's `size.load(Acquire)`
/// (or the `Acquire` fetch_sub before it) happens-after that release,
/// guaranteeing the slot bytes are visible before the consumer reads
/// them. `shutdown` is set at most once from outside the hot path and
/// uses `Release`/`Acquire` for the same reason.
pub struct RingBuffer {
    slots: Box<[Slot]>,
    slot_size: usize,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    size: AtomicUsize,
    shutdown: AtomicBool,
    waiter: (Mutex<()>, Condvar),
}

impl RingBuffer {
    fn new(capacity: usize, slot_size: usize) -> Arc<Self> {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        assert!(slot_size > 4, "slot size must fit at least the length prefix");
        let slots = (0..capacity)
            .map(|_| Slot(UnsafeCell::new(vec![0u8; slot_size].into_boxed_slice())))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Arc::new(Self {
            slots,
            slot_size,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            waiter: (Mutex::new(()), Condvar::new()),
        })
    }

    pub fn depth(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Creates a ring buffer and returns its single producer and single
/// consumer handles. Each handle is obtained exactly once here — neither
/// [`Producer`] nor [`Consumer`] can be cloned or constructed any other
/// way — so the SPSC invariant is enforced by the type system rather than
/// by caller discipline alone.
pub fn channel(capacity: usize, slot_size: usize) -> (Producer, Consumer) {
    let ring = RingBuffer::new(capacity, slot_size);
    (Producer { ring: Arc::clone(&ring) }, Consumer { ring })
}

pub struct Producer {
    ring: Arc<RingBuffer>,
}

// SAFETY: see `Slot`'s safety comment; `Producer` is the only handle that
// writes slots and only one `Producer` is ever created per ring.
unsafe impl Send for Producer {}

pub struct Consumer {
    ring: Arc<RingBuffer>,
}

unsafe impl Send for Consumer {}

impl Producer {
    /// Enqueues `event`. Returns `Ok(false)` if the ring is full — the
    /// caller's documented fallback is a direct, inline
    /// `store.append(event)` plus a drop-counter increment
    /// (`spec.md` §4.2).
    pub fn enqueue(&self, event: &DomainEvent) -> Result<bool, QueueError> {
        if self.ring.size.load(Ordering::Acquire) == self.ring.capacity {
            return Ok(false);
        }

        let payload = serde_json::to_vec(event)?;
        if payload.len() > self.ring.slot_size - 4 {
            return Err(QueueError::PayloadTooLarge(payload.len()));
        }

        let tail = self.ring.tail.load(Ordering::Relaxed);
        let slot_idx = tail % self.ring.capacity;
        // SAFETY: only the producer writes this slot, and it only does so
        // for an index the consumer has already finished reading (size
        // never exceeded capacity just above).
        let slot = unsafe { &mut *self.ring.slots[slot_idx].0.get() };
        slot[0..4].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        slot[4..4 + payload.len()].copy_from_slice(&payload);

        self.ring.tail.store(tail + 1, Ordering::Relaxed);
        self.ring.size.fetch_add(1, Ordering::Release);

        let (lock, cvar) = &self.ring.waiter;
        let _guard = lock.lock().unwrap();
        cvar.notify_one();

        Ok(true)
    }

    pub fn signal_shutdown(&self) {
        self.ring.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &self.ring.waiter;
        let _guard = lock.lock().unwrap();
        cvar.notify_all();
    }

    pub fn depth(&self) -> usize {
        self.ring.depth()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl Consumer {
    /// Pops up to `max` events, waiting up to `wait_ms` if the ring is
    /// currently empty (`spec.md` §4.2's `dequeueBatch`).
    pub fn dequeue_batch(&self, max: usize, wait_ms: u64) -> Vec<DomainEvent> {
        if self.ring.size.load(Ordering::Acquire) == 0 && !self.ring.is_shutdown() {
            let (lock, cvar) = &self.ring.waiter;
            let guard = lock.lock().unwrap();
            let _ = cvar
                .wait_timeout_while(guard, Duration::from_millis(wait_ms), |_| {
                    self.ring.size.load(Ordering::Acquire) == 0 && !self.ring.is_shutdown()
                })
                .unwrap();
        }

        let mut out = Vec::new();
        while out.len() < max {
            if self.ring.size.load(Ordering::Acquire) == 0 {
                break;
            }
            let head = self.ring.head.load(Ordering::Relaxed);
            let slot_idx = head % self.ring.capacity;
            // SAFETY: only the consumer reads this slot, and `size > 0`
            // guarantees the producer's write (Release) happened-before
            // this load (Acquire) of `size` above.
            let slot = unsafe { &*self.ring.slots[slot_idx].0.get() };
            let len = u32::from_le_bytes(slot[0..4].try_into().unwrap()) as usize;
            match serde_json::from_slice::<DomainEvent>(&slot[4..4 + len]) {
                Ok(event) => out.push(event),
                Err(error) => {
                    tracing::error!(?error, "failed to decode queued event, skipping slot");
                }
            }

            self.ring.head.store(head + 1, Ordering::Relaxed);
            self.ring.size.fetch_sub(1, Ordering::Release);
        }
        out
    }

    pub fn is_shutdown(&self) -> bool {
        self.ring.is_shutdown()
    }

    pub fn depth(&self) -> usize {
        self.ring.depth()
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
    fn wraparound_capacity_one() {
        let (producer, consumer) = channel(1, 256);
        assert!(producer.enqueue(&tick_event(1)).unwrap());
        assert!(!producer.enqueue(&tick_event(2)).unwrap());

        let drained = consumer.dequeue_batch(10, 10);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].ts, 1);

        assert!(producer.enqueue(&tick_event(3)).unwrap());
    }

    #[test]
    fn payload_too_large_is_rejected() {
        let (producer, _consumer) = channel(4, 16);
        let mut event = tick_event(1);
        event.metadata = Some(
            (0..20)
                .map(|i| (format!("k{i}"), serde_json::Value::String("x".repeat(20))))
                .collect(),
        );
        let err = producer.enqueue(&event).unwrap_err();
        assert!(matches!(err, QueueError::PayloadTooLarge(_)));
    }

    #[test]
    fn produced_equals_consumed_plus_pending() {
        let (producer, consumer) = channel(8, 256);
        for i in 0..5 {
            assert!(producer.enqueue(&tick_event(i)).unwrap());
        }
        let drained = consumer.dequeue_batch(3, 10);
        assert_eq!(drained.len(), 3);
        assert_eq!(consumer.depth(), 2);
    }

    #[test]
    fn dequeue_returns_promptly_when_ring_is_empty() {
        let (_producer, consumer) = channel(4, 256);
        let start = std::time::Instant::now();
        let drained = consumer.dequeue_batch(10, 30);
        assert!(drained.is_empty());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
