use crate::ids::TimestampMs;
use std::sync::atomic::{AtomicI64, Ordering};

/// Capability for reading the current time, injected everywhere time is
/// read so that tests (and the backtest harness) can substitute
/// [`ManualClock`] for [`SystemClock`]. Mirrors the design note in
/// `spec.md` §9 ("Expose a Clock capability everywhere time is read").
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_ms(&self) -> TimestampMs;
}

/// Wall-clock time source used in live trading.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A monotonic clock driven explicitly by the backtest harness.
///
/// `advance_to` enforces monotonicity per `spec.md` §4.9 ("moving backward
/// is an error").
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

#[derive(Debug, thiserror::Error)]
#[error("manual clock cannot move backward: current={current} requested={requested}")]
pub struct ClockRewindError {
    pub current: TimestampMs,
    pub requested: TimestampMs,
}

impl ManualClock {
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Advances the clock to `t`. Errors if `t` is strictly before the
    /// current time; equal timestamps are allowed (multiple events can
    /// share a millisecond).
    pub fn advance_to(&self, t: TimestampMs) -> Result<(), ClockRewindError> {
        let current = self.now.load(Ordering::Acquire);
        if t < current {
            return Err(ClockRewindError {
                current,
                requested: t,
            });
        }
        self.now.store(t, Ordering::Release);
        Ok(())
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_forward() {
        let clock = ManualClock::new(100);
        clock.advance_to(150).unwrap();
        assert_eq!(clock.now_ms(), 150);
    }

    #[test]
    fn manual_clock_rejects_rewind() {
        let clock = ManualClock::new(100);
        clock.advance_to(150).unwrap();
        let err = clock.advance_to(90).unwrap_err();
        assert_eq!(err.current, 150);
        assert_eq!(err.requested, 90);
        assert_eq!(clock.now_ms(), 150);
    }

    #[test]
    fn manual_clock_allows_same_timestamp() {
        let clock = ManualClock::new(100);
        assert!(clock.advance_to(100).is_ok());
    }
}
