use super::Projection;
use crate::error::StoreError;
use ember_core::event::{EventKind, PnlAnalyticsPayload};
use ember_core::DomainEvent;

/// The latest `pnl.analytics` payload (`spec.md` §3).
#[derive(Debug, Default, Clone)]
pub struct PnlState(pub Option<PnlAnalyticsPayload>);

pub struct PnlProjection;

impl Projection for PnlProjection {
    type State = PnlState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        if let EventKind::PnlAnalytics(payload) = &event.kind {
            state.0 = Some(*payload);
        }
        Ok(state)
    }
}
