//! The Ember trading runtime: wires the feed manager, strategy registry,
//! intent builder, pre-trade risk, execution adapters, exit engine, and
//! the persistence pipeline into one running engine (`spec.md` §4).

pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod strategy_unit;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
