use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier carried by every [`crate::event::DomainEvent`].
///
/// Mirrors the teacher's use of [`uuid::Uuid`] for engine/trader ids
/// (`src/engine/trader.rs`), generalised to every event in the log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch, as reported by the active [`crate::clock::Clock`].
pub type TimestampMs = i64;

/// Stable key for a [`crate::position::Position`], derived the way
/// `determine_position_id` does in `src/portfolio/position.rs`: from the
/// account/venue and symbol rather than a random id, so repeated lookups
/// for the same market always hit the same key.
pub fn position_id(account: &str, symbol: &str) -> String {
    format!("{account}_{symbol}")
}
