/// Order-placement mode (`spec.md` §4.5). `Market`/`TakerOnDrift` only
/// ever build a taker candidate; `Limit` only a maker candidate;
/// `MakerPreferred` builds both and keeps the larger net edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IntentMode {
    Market,
    TakerOnDrift,
    Limit,
    MakerPreferred,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IntentPolicy {
    pub mode: IntentMode,
    pub min_edge_bps: f64,
    pub taker_fee_bps: f64,
    pub taker_slip_bps: f64,
    pub maker_fee_bps: f64,
    pub adverse_selection_bps: f64,
    pub post_only: bool,
    pub limit_offset_bps: f64,
    pub tick_size: f64,
    pub lot_size: f64,
    pub notional_usd: f64,
    pub default_qty: f64,
    pub cooldown_ms: i64,
    pub dedupe_window_ms: i64,
}

impl IntentPolicy {
    pub fn taker_required_edge_bps(&self) -> f64 {
        self.min_edge_bps + self.taker_fee_bps + self.taker_slip_bps
    }

    pub fn maker_required_edge_bps(&self) -> f64 {
        self.min_edge_bps + self.maker_fee_bps + self.adverse_selection_bps
    }
}
