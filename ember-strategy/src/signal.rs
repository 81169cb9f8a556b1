use crate::dsl::Operator;
use ember_core::{SignalAction, StrategySignalPayload};

/// The DSL's public signal type (`spec.md` §4.4's `StrategySignal`).
pub type StrategySignal = StrategySignalPayload;

/// Drops a signal whose action matches the immediately preceding one
/// (`spec.md` §4.4's `dedupeConsecutiveSignals`).
pub struct DedupeConsecutiveSignals {
    last_action: Option<SignalAction>,
}

impl DedupeConsecutiveSignals {
    pub fn new() -> Self {
        Self { last_action: None }
    }
}

impl Default for DedupeConsecutiveSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator<StrategySignal> for DedupeConsecutiveSignals {
    type Out = StrategySignal;
    fn push(&mut self, input: StrategySignal) -> Option<StrategySignal> {
        if self.last_action == Some(input.action) {
            return None;
        }
        self.last_action = Some(input.action);
        Some(input)
    }
}

/// Suppresses emissions within `cooldown_ms` of the last one
/// (`spec.md` §4.4's `withSignalCooldown`).
pub struct WithSignalCooldown {
    cooldown_ms: i64,
    last_emit_ts: Option<i64>,
}

impl WithSignalCooldown {
    pub fn new(cooldown_ms: i64) -> Self {
        Self { cooldown_ms, last_emit_ts: None }
    }
}

impl Operator<StrategySignal> for WithSignalCooldown {
    type Out = StrategySignal;
    fn push(&mut self, input: StrategySignal) -> Option<StrategySignal> {
        if let Some(last) = self.last_emit_ts {
            if input.t - last < self.cooldown_ms {
                return None;
            }
        }
        self.last_emit_ts = Some(input.t);
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(action: SignalAction, t: i64) -> StrategySignal {
        StrategySignal {
            strategy_id: "s".into(),
            symbol: "SIM".into(),
            action,
            px: 100.0,
            t,
        }
    }

    #[test]
    fn dedupe_drops_repeated_action() {
        let mut dedupe = DedupeConsecutiveSignals::new();
        assert!(dedupe.push(signal(SignalAction::Buy, 1)).is_some());
        assert!(dedupe.push(signal(SignalAction::Buy, 2)).is_none());
        assert!(dedupe.push(signal(SignalAction::Sell, 3)).is_some());
    }

    #[test]
    fn cooldown_suppresses_within_window() {
        let mut cooldown = WithSignalCooldown::new(1000);
        assert!(cooldown.push(signal(SignalAction::Buy, 0)).is_some());
        assert!(cooldown.push(signal(SignalAction::Buy, 500)).is_none());
        assert!(cooldown.push(signal(SignalAction::Buy, 1000)).is_some());
    }
}
