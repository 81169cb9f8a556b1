use std::collections::HashMap;

/// Risk limits configuration (`spec.md` §4.6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RiskLimits {
    pub notional: f64,
    pub max_position: f64,
    pub price_bands: HashMap<String, (f64, f64)>,
    pub throttle_window_ms: i64,
    pub throttle_max_count: usize,
}

impl RiskLimits {
    pub fn price_band(&self, symbol: &str) -> Option<(f64, f64)> {
        self.price_bands.get(symbol).copied()
    }
}
