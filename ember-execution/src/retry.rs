use rand::Rng;
use std::time::Duration;

/// Retry backoff configuration (`spec.md` §4.7): `delay = min(maxDelay,
/// baseDelay * 2^(attempt-1)) ± jitter * delay`, up to `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the computed delay applied as uniform jitter, e.g. `0.2`
    /// for ±20%.
    pub jitter: f64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Delay before retry attempt number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let scaled = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX).max(1));
        let base = scaled.min(self.max_delay_ms) as f64;

        let jitter_span = base * self.jitter.max(0.0);
        let offset = if jitter_span > 0.0 {
            rand::rng().random_range(-jitter_span..=jitter_span)
        } else {
            0.0
        };

        Duration::from_millis((base + offset).max(0.0) as u64)
    }
}
