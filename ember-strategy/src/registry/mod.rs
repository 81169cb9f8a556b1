pub mod arbitrage;
pub mod momentum;
pub mod pair;

pub use arbitrage::{ArbitrageParams, ArbitrageStrategy};
pub use momentum::{MomentumParams, MomentumStrategy};
pub use pair::{PairParams, PairStrategy};
