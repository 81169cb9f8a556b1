use ember_core::TimestampMs;

/// Circuit breaker configuration (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub cooldown_ms: i64,
    pub half_open_max_successes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Closed,
    Open { retry_at: TimestampMs },
    HalfOpen { successes: u32 },
}

/// `closed → open → half-open → closed` state machine gating submits
/// through a [`crate::policy::PolicyWrapper`] (`spec.md` §4.7). One
/// instance per adapter/venue; state is never shared across adapters.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    state: State,
    consecutive_failures: u32,
}

/// Whether a submit attempt is permitted right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    Refused { retry_at: TimestampMs },
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: State::Closed,
            consecutive_failures: 0,
        }
    }

    /// Call before attempting a submit. Transitions `open -> half-open`
    /// when `now >= retry_at`.
    pub fn admit(&mut self, now_ms: TimestampMs) -> Admission {
        match self.state {
            State::Closed | State::HalfOpen { .. } => Admission::Allowed,
            State::Open { retry_at } => {
                if now_ms >= retry_at {
                    self.state = State::HalfOpen { successes: 0 };
                    Admission::Allowed
                } else {
                    Admission::Refused { retry_at }
                }
            }
        }
    }

    /// Records a successful submit. Only reachable in `closed` or
    /// `half-open` since `admit` always moves `open` to `half-open` first.
    /// In `half-open`, closes and resets after `half_open_max_successes`
    /// consecutive successes.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        if let State::HalfOpen { successes } = self.state {
            let successes = successes + 1;
            self.state = if successes >= self.config.half_open_max_successes {
                State::Closed
            } else {
                State::HalfOpen { successes }
            };
        }
    }

    /// Records a failed submit. A failure while `half-open` immediately
    /// re-opens the circuit. In `closed`, opens once consecutive failures
    /// reach `failure_threshold`.
    pub fn on_failure(&mut self, now_ms: TimestampMs) {
        self.consecutive_failures += 1;
        match self.state {
            State::HalfOpen { .. } => self.open(now_ms),
            State::Closed if self.consecutive_failures >= self.config.failure_threshold => {
                self.open(now_ms)
            }
            _ => {}
        }
    }

    fn open(&mut self, now_ms: TimestampMs) {
        self.state = State::Open {
            retry_at: now_ms + self.config.cooldown_ms,
        };
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 3,
            cooldown_ms: 1000,
            half_open_max_successes: 2,
        }
    }

    #[test]
    fn opens_after_consecutive_failures_reach_threshold() {
        let mut cb = CircuitBreaker::new(config());
        cb.on_failure(0);
        cb.on_failure(1);
        assert!(!cb.is_open());
        cb.on_failure(2);
        assert!(cb.is_open());
    }

    #[test]
    fn refuses_submits_before_retry_at_then_admits_half_open() {
        let mut cb = CircuitBreaker::new(config());
        cb.on_failure(0);
        cb.on_failure(0);
        cb.on_failure(0);
        assert_eq!(cb.admit(500), Admission::Refused { retry_at: 1000 });
        assert_eq!(cb.admit(1000), Admission::Allowed);
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let mut cb = CircuitBreaker::new(config());
        cb.on_failure(0);
        cb.on_failure(0);
        cb.on_failure(0);
        cb.admit(1000);
        cb.on_failure(1000);
        assert_eq!(cb.admit(1000), Admission::Refused { retry_at: 2000 });
    }

    #[test]
    fn closes_after_half_open_max_successes() {
        let mut cb = CircuitBreaker::new(config());
        cb.on_failure(0);
        cb.on_failure(0);
        cb.on_failure(0);
        cb.admit(1000);
        cb.on_success();
        assert!(cb.is_open());
        cb.on_success();
        assert!(!cb.is_open());
        assert_eq!(cb.admit(1000), Admission::Allowed);
    }
}
