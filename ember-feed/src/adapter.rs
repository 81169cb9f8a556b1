use crate::error::FeedError;
use crate::hooks::FeedHooks;
use async_trait::async_trait;
use ember_core::MarketTick;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A single upstream tick source (`spec.md` §4.3). `connect` drives the
/// adapter's connection for as long as it stays up, pushing ticks to
/// `tx` and reporting lifecycle transitions through `hooks`; it returns
/// when the connection ends, whether cleanly or with an error, so the
/// caller (the supervisor, or a backtest harness calling a historical
/// adapter directly) can decide what happens next.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    fn id(&self) -> &str;

    async fn connect(
        &self,
        tx: mpsc::Sender<MarketTick>,
        hooks: Arc<dyn FeedHooks>,
    ) -> Result<(), FeedError>;

    /// Requests the adapter stop pushing ticks and tear down its
    /// connection. Optional per `spec.md` §4.3; the default is a no-op
    /// for adapters with nothing to release.
    async fn disconnect(&self) -> Result<(), FeedError> {
        Ok(())
    }
}

/// Pushes a pre-sorted batch of ticks and then returns, never
/// reconnecting (`spec.md` §5's backtest dependency injection). Intended
/// to be driven directly by the backtest harness rather than through a
/// [`FeedManager`](crate::manager::FeedManager), since it has no
/// reconnection behavior to supervise.
pub struct HistoricalFeedAdapter {
    id: String,
    ticks: Vec<MarketTick>,
}

impl HistoricalFeedAdapter {
    pub fn new(id: impl Into<String>, mut ticks: Vec<MarketTick>) -> Self {
        ticks.sort_by_key(|t| t.t);
        Self { id: id.into(), ticks }
    }
}

#[async_trait]
impl FeedAdapter for HistoricalFeedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(
        &self,
        tx: mpsc::Sender<MarketTick>,
        hooks: Arc<dyn FeedHooks>,
    ) -> Result<(), FeedError> {
        hooks.on_status_change(&self.id, crate::hooks::FeedStatus::Connecting);
        hooks.on_status_change(&self.id, crate::hooks::FeedStatus::Connected);

        for tick in &self.ticks {
            if tx.send(tick.clone()).await.is_err() {
                break;
            }
            hooks.on_tick(&self.id, tick.t);
        }

        hooks.on_status_change(&self.id, crate::hooks::FeedStatus::Disconnected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FeedStatus;
    use std::sync::Mutex;

    struct RecordingHooks {
        statuses: Mutex<Vec<FeedStatus>>,
        ticks: Mutex<Vec<i64>>,
    }

    impl FeedHooks for RecordingHooks {
        fn on_status_change(&self, _feed_id: &str, status: FeedStatus) {
            self.statuses.lock().unwrap().push(status);
        }
        fn on_reconnect(&self, _feed_id: &str, _attempt: u32) {}
        fn on_tick(&self, _feed_id: &str, ts: i64) {
            self.ticks.lock().unwrap().push(ts);
        }
    }

    #[tokio::test]
    async fn historical_adapter_pushes_ticks_in_order_then_disconnects() {
        let ticks = vec![
            MarketTick::new(20, "SIM", None, None, Some(1.0), None, None).unwrap(),
            MarketTick::new(10, "SIM", None, None, Some(1.0), None, None).unwrap(),
        ];
        let adapter = HistoricalFeedAdapter::new("hist-1", ticks);
        let (tx, mut rx) = mpsc::channel(8);
        let hooks = Arc::new(RecordingHooks {
            statuses: Mutex::new(Vec::new()),
            ticks: Mutex::new(Vec::new()),
        });

        adapter.connect(tx, Arc::clone(&hooks) as Arc<dyn FeedHooks>).await.unwrap();

        let mut received = Vec::new();
        while let Some(tick) = rx.recv().await {
            received.push(tick.t);
        }
        assert_eq!(received, vec![10, 20]);
        assert_eq!(
            *hooks.statuses.lock().unwrap(),
            vec![FeedStatus::Connecting, FeedStatus::Connected, FeedStatus::Disconnected]
        );
    }
}
