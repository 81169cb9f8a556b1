use crate::adapter::ExecutionAdapter;
use crate::error::ExecutionError;
use crate::event::ExecutionEvent;
use async_trait::async_trait;
use ember_core::{Clock, EventId, Fill, Liquidity, MarketTick, OrderNew, PriceSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Paper execution adapter used by the backtest harness and for local
/// development (`spec.md` §4.9): acks and fills immediately at the latest
/// observed tick price for the order's symbol, falling back to
/// `meta.execRefPx` and then the order's own limit price if no tick has
/// been observed yet. Mirrors `src/execution/simulated.rs`'s
/// "assume all orders fill at the market price" shape, generalized with a
/// configurable fee rate.
pub struct PaperExecutionAdapter {
    id: String,
    fee_bps: f64,
    clock: Arc<dyn Clock>,
    last_tick: Mutex<HashMap<String, MarketTick>>,
}

impl PaperExecutionAdapter {
    pub fn new(id: impl Into<String>, fee_bps: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: id.into(),
            fee_bps,
            clock,
            last_tick: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe_tick(&self, tick: MarketTick) {
        self.last_tick.lock().insert(tick.symbol.clone(), tick);
    }

    fn fill_price(&self, order: &OrderNew) -> Result<f64, ExecutionError> {
        if let Some(tick) = self.last_tick.lock().get(&order.symbol) {
            if let Some(px) = tick.price_from(PriceSource::Last) {
                return Ok(px);
            }
        }
        if let Some(ref_px) = order.meta_f64("execRefPx") {
            return Ok(ref_px);
        }
        order.px.ok_or_else(|| ExecutionError::FatalIo {
            adapter: self.id.clone(),
            reason: format!("no reference price available for {}", order.symbol),
        })
    }
}

#[async_trait]
impl ExecutionAdapter for PaperExecutionAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn submit(
        &self,
        order: &OrderNew,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError> {
        let px = self.fill_price(order)?;
        let now = self.clock.now_ms();

        let _ = events
            .send(ExecutionEvent::Ack { order_id: order.id, venue_order_id: None })
            .await;

        let fee = (order.qty * px).abs() * self.fee_bps / 10_000.0;
        let fill = Fill {
            id: EventId::new(),
            order_id: order.id,
            t: now,
            symbol: order.symbol.clone(),
            px,
            qty: order.qty,
            side: order.side,
            fee: Some(fee),
            liquidity: Some(Liquidity::Taker),
        };
        let _ = events.send(ExecutionEvent::Fill(fill)).await;
        Ok(())
    }

    async fn cancel(
        &self,
        order_id: EventId,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError> {
        // Paper orders fill synchronously inside `submit`, so by the time a
        // cancel could arrive there is nothing in flight to stop.
        let _ = events
            .send(ExecutionEvent::Cancel { order_id, reason: Some("already settled".to_string()) })
            .await;
        Ok(())
    }
}
