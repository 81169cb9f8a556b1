//! Event store backends and projections for the Ember trading runtime.

pub mod bus;
pub mod error;
pub mod memory;
pub mod projections;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use bus::{EventBus, Subscription};
pub use error::StoreError;
pub use memory::InMemoryEventStore;
pub use store::{EventStore, Snapshot};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventStore;
