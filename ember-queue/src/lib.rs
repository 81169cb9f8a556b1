//! Shared-memory SPSC queue decoupling the hot tick-to-trade path from
//! event-store durability, plus the persistence worker that drains it.

pub mod ring;
pub mod worker;

pub use ring::{channel, Consumer, Producer, QueueError, RingBuffer};
pub use worker::{enqueue_or_fallback, PersistenceWorker, HIGH_WATERMARK_FRACTION, LOW_WATERMARK_FRACTION};
