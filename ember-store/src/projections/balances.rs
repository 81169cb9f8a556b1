use super::Projection;
use crate::error::StoreError;
use ember_core::event::EventKind;
use ember_core::{AssetBalance, DomainEvent};
use std::collections::HashMap;

const DRIFT_EPSILON: f64 = 1e-6;

/// Mapping venue -> asset -> [`AssetBalance`], reduced from
/// `account.balance.adjusted` events (`spec.md` §3). If the event carries
/// `new_total`, the reducer enforces
/// `|new_total - (existing.total + delta)| < 1e-6`, failing with
/// [`StoreError::InvariantViolation`] otherwise — this must never be
/// silently ignored (`spec.md` §7, `InvariantViolation`).
#[derive(Debug, Default, Clone)]
pub struct BalancesState(pub HashMap<String, HashMap<String, AssetBalance>>);

pub struct BalancesProjection;

impl Projection for BalancesProjection {
    type State = BalancesState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        if let EventKind::AccountBalanceAdjusted(adj) = &event.kind {
            let venue_book = state.0.entry(adj.venue.clone()).or_default();
            let existing = venue_book.entry(adj.asset.clone()).or_insert_with(|| AssetBalance::zero(event.ts));

            let new_total = existing.total + adj.delta;
            if let Some(reported) = adj.new_total {
                if (reported - new_total).abs() >= DRIFT_EPSILON {
                    return Err(StoreError::InvariantViolation(format!(
                        "balance drift for {}/{}: reported={reported} derived={new_total}",
                        adj.venue, adj.asset
                    )));
                }
            }

            existing.total = new_total;
            existing.available += adj.delta;
            existing.last_updated = event.ts;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::event::BalanceAdjustedPayload;

    fn adjust(venue: &str, asset: &str, delta: f64, new_total: Option<f64>, ts: i64) -> DomainEvent {
        DomainEvent::new(
            ts,
            EventKind::AccountBalanceAdjusted(BalanceAdjustedPayload {
                venue: venue.to_string(),
                asset: asset.to_string(),
                delta,
                new_total,
            }),
        )
    }

    #[test]
    fn accumulates_delta_without_new_total() {
        let events = vec![adjust("binance", "USDT", 100.0, None, 1), adjust("binance", "USDT", -30.0, None, 2)];
        let state = BalancesProjection::fold(&events).unwrap();
        assert_eq!(state.0["binance"]["USDT"].total, 70.0);
    }

    #[test]
    fn consistent_new_total_is_accepted() {
        let events = vec![adjust("binance", "USDT", 100.0, Some(100.0), 1)];
        assert!(BalancesProjection::fold(&events).is_ok());
    }

    #[test]
    fn inconsistent_new_total_fails_the_reducer() {
        let events = vec![adjust("binance", "USDT", 100.0, Some(50.0), 1)];
        let err = BalancesProjection::fold(&events).unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation(_)));
    }
}
