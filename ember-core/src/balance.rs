use crate::ids::TimestampMs;
use serde::{Deserialize, Serialize};

/// Per-venue, per-asset balance view reduced from `account.balance.adjusted`
/// events (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub available: f64,
    pub locked: f64,
    pub total: f64,
    pub last_updated: TimestampMs,
}

impl AssetBalance {
    pub fn zero(t: TimestampMs) -> Self {
        Self {
            available: 0.0,
            locked: 0.0,
            total: 0.0,
            last_updated: t,
        }
    }
}

/// Provider-reported snapshot vs ledger-derived total, plus drift, reduced
/// from `account.balance.snapshot` events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub provider_total: f64,
    pub ledger_total: f64,
    pub drift: f64,
    pub last_updated: TimestampMs,
}

/// Margin/leverage summary reduced from `account.margin.updated` events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginSummary {
    pub used: f64,
    pub available: f64,
    pub leverage: f64,
    pub last_updated: TimestampMs,
}
