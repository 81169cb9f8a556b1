//! Feed adapter contract, reconnect backoff, and the multiplexing feed
//! manager for the Ember trading runtime.

pub mod adapter;
pub mod backoff;
pub mod error;
pub mod hooks;
pub mod manager;

pub use adapter::{FeedAdapter, HistoricalFeedAdapter};
pub use backoff::ReconnectPolicy;
pub use error::FeedError;
pub use hooks::{FeedHealth, FeedHooks, FeedStatus};
pub use manager::FeedManager;
