use crate::error::ExecutionError;
use crate::event::ExecutionEvent;
use async_trait::async_trait;
use ember_core::{EventId, OrderNew};
use tokio::sync::mpsc;

/// Narrow venue-execution contract (`spec.md` §4.7/§6). Implementations:
/// a live venue's REST client, [`crate::paper::PaperExecutionAdapter`] for
/// backtests/dev, and any test double. Venue wire formats are out of
/// scope; only this seam is specified.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    fn id(&self) -> &str;

    /// Submits `order`. Lifecycle events (ack, fill, reject) are pushed
    /// onto `events` as they occur; this call returns once the venue has
    /// acknowledged receipt of the submit attempt itself, not once the
    /// order has settled.
    async fn submit(
        &self,
        order: &OrderNew,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError>;

    async fn cancel(
        &self,
        order_id: EventId,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), ExecutionError>;
}
