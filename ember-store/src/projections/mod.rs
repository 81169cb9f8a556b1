pub mod balances;
pub mod margin;
pub mod orders;
pub mod pnl;
pub mod positions;

use crate::error::StoreError;
use ember_core::DomainEvent;

/// A projection is a pure fold over the event log (`spec.md` §3, §8's
/// "pure fold law": `P(X) == fold(reduce, X, init)` for any prefix `X`).
pub trait Projection {
    type State: Default + Clone;

    fn reduce(state: Self::State, event: &DomainEvent) -> Result<Self::State, StoreError>;

    /// Folds `events` into a fresh state starting from `State::default()`.
    fn fold(events: &[DomainEvent]) -> Result<Self::State, StoreError> {
        events.iter().try_fold(Self::State::default(), |state, event| Self::reduce(state, event))
    }
}
