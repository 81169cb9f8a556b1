use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter for feed reconnection (`spec.md` §4.3):
/// `delay = clamp(base * 2^attempt, base, max) ± jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter_ms: u64,
    /// `None` means retries are unbounded (`spec.md` §4.3).
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn new(base_ms: u64, max_ms: u64, jitter_ms: u64, max_attempts: Option<u32>) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_ms,
            max_attempts,
        }
    }

    /// Whether a further reconnect attempt is permitted after `attempt`
    /// failures (1-indexed).
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map(|max| attempt <= max).unwrap_or(true)
    }

    /// Delay before reconnect attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let scaled = self.base_ms.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX).max(1));
        let clamped = scaled.clamp(self.base_ms, self.max_ms);

        let jitter = if self.jitter_ms > 0 {
            let magnitude = rand::rng().random_range(0..=self.jitter_ms);
            let sign_negative = rand::rng().random_bool(0.5);
            if sign_negative {
                -(magnitude as i64)
            } else {
                magnitude as i64
            }
        } else {
            0
        };

        let total = (clamped as i64 + jitter).max(0) as u64;
        Duration::from_millis(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_max_then_clamps() {
        let policy = ReconnectPolicy::new(100, 1000, 0, None);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = ReconnectPolicy::new(200, 10_000, 50, None);
        for attempt in 1..=5 {
            let delay = policy.delay_for(attempt);
            let base = (200u64 * 2u64.pow(attempt - 1)).min(10_000);
            let lower = base.saturating_sub(50);
            let upper = base + 50;
            assert!(delay.as_millis() as u64 >= lower);
            assert!(delay.as_millis() as u64 <= upper);
        }
    }

    #[test]
    fn max_attempts_bounds_retries() {
        let policy = ReconnectPolicy::new(10, 100, 0, Some(3));
        assert!(policy.allows(1));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }

    #[test]
    fn unbounded_when_max_attempts_none() {
        let policy = ReconnectPolicy::new(10, 100, 0, None);
        assert!(policy.allows(10_000));
    }
}
