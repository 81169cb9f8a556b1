use super::Projection;
use crate::error::StoreError;
use ember_core::event::EventKind;
use ember_core::{DomainEvent, EventId};
use std::collections::HashMap;

/// Mapping order-id -> latest `order.*` event (`spec.md` §3).
#[derive(Debug, Default, Clone)]
pub struct OrdersState(pub HashMap<EventId, DomainEvent>);

pub struct OrdersProjection;

impl Projection for OrdersProjection {
    type State = OrdersState;

    fn reduce(mut state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError> {
        let order_id = match &event.kind {
            EventKind::OrderNew(o) => Some(o.id),
            EventKind::OrderAck(a) => Some(a.order_id),
            EventKind::OrderReject(r) => Some(r.order_id),
            EventKind::OrderCancel(c) => Some(c.order_id),
            EventKind::OrderFill(f) => Some(f.order_id),
            _ => None,
        };
        if let Some(order_id) = order_id {
            state.0.insert(order_id, event.clone());
        }
        Ok(state)
    }
}
