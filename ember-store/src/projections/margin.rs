use super::Projection;
use crate::error::StoreError;
use ember_core::event::EventKind;
use ember_core::{DomainEvent, MarginSummary};
use std::collections::HashMap;

/// Mapping venue -> latest [`MarginSummary`] (`spec.md` §3).
#[derive(Debug, Default, Clone)]
pub struct MarginState(pub HashMap<String, MarginSummary>);

pub struct MarginProjection;

impl Projection for MarginProjection {
    type State = MarginState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        if let EventKind::AccountMarginUpdated(update) = &event.kind {
            state.0.insert(update.venue.clone(), update.summary);
        }
        Ok(state)
    }
}

/// Mapping venue -> asset -> (provider total, ledger total, drift), from
/// `account.balance.snapshot` events (`spec.md` §3's "Balance snapshots").
#[derive(Debug, Default, Clone)]
pub struct BalanceSnapshotState(pub HashMap<String, HashMap<String, ember_core::BalanceSnapshot>>);

pub struct BalanceSnapshotProjection;

impl Projection for BalanceSnapshotProjection {
    type State = BalanceSnapshotState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        if let EventKind::AccountBalanceSnapshot(snap) = &event.kind {
            let venue_book = state.0.entry(snap.venue.clone()).or_default();
            venue_book.insert(
                snap.asset.clone(),
                ember_core::BalanceSnapshot {
                    provider_total: snap.provider_total,
                    ledger_total: snap.ledger_total,
                    drift: snap.provider_total - snap.ledger_total,
                    last_updated: event.ts,
                },
            );
        }
        Ok(state)
    }
}
