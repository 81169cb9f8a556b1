use super::Projection;
use crate::error::StoreError;
use ember_core::{event::EventKind, DomainEvent, Position};
use std::collections::HashMap;

/// Mapping symbol -> [`Position`], mirrored from the latest
/// `portfolio.snapshot` event (`spec.md` §3).
#[derive(Debug, Default, Clone)]
pub struct PositionsState(pub HashMap<String, Position>);

pub struct PositionsProjection;

impl Projection for PositionsProjection {
    type State = PositionsState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        if let EventKind::PortfolioSnapshot(snapshot) = &event.kind {
            state.0 = snapshot.positions.clone();
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::event::PortfolioSnapshotPayload;

    #[test]
    fn latest_snapshot_wins() {
        let mut first = HashMap::new();
        first.insert("SIM".to_string(), Position::flat());
        let mut second_pos = Position::flat();
        second_pos.pos = 5.0;
        let mut second = HashMap::new();
        second.insert("SIM".to_string(), second_pos);

        let events = vec![
            DomainEvent::new(1, EventKind::PortfolioSnapshot(PortfolioSnapshotPayload { positions: first })),
            DomainEvent::new(2, EventKind::PortfolioSnapshot(PortfolioSnapshotPayload { positions: second })),
        ];

        let state = PositionsProjection::fold(&events).unwrap();
        assert_eq!(state.0["SIM"].pos, 5.0);
    }
}
