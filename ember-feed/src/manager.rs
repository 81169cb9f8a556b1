use crate::adapter::FeedAdapter;
use crate::backoff::ReconnectPolicy;
use crate::hooks::{FeedHealth, FeedHooks, FeedStatus};
use ember_core::MarketTick;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const MARKS_CHANNEL_CAPACITY: usize = 4096;

struct Registration {
    adapter: Arc<dyn FeedAdapter>,
    policy: ReconnectPolicy,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Shared [`FeedHooks`] implementation that updates the health table and
/// emits structured logs, used by every supervised feed.
struct HealthSink {
    health: Mutex<HashMap<String, FeedHealth>>,
}

impl FeedHooks for HealthSink {
    fn on_status_change(&self, feed_id: &str, status: FeedStatus) {
        let mut table = self.health.lock();
        let entry = table.entry(feed_id.to_string()).or_default();
        entry.status = status;
        info!(feed_id, ?status, "feed status changed");
    }

    fn on_reconnect(&self, feed_id: &str, attempt: u32) {
        let mut table = self.health.lock();
        let entry = table.entry(feed_id.to_string()).or_default();
        entry.reconnect_count = attempt;
        warn!(feed_id, attempt, "feed reconnecting");
    }

    fn on_tick(&self, feed_id: &str, ts: i64) {
        let mut table = self.health.lock();
        let entry = table.entry(feed_id.to_string()).or_default();
        entry.last_tick_ms = Some(ts);
    }
}

/// Multiplexes N [`FeedAdapter`]s into a single ordered-by-arrival tick
/// stream (`spec.md` §4.3's `marks`), supervising each with its own
/// reconnect backoff and tracking per-feed health.
pub struct FeedManager {
    registrations: Mutex<Vec<Registration>>,
    health: Arc<HealthSink>,
    marks_tx: mpsc::Sender<MarketTick>,
    marks_rx: Mutex<Option<mpsc::Receiver<MarketTick>>>,
}

impl FeedManager {
    pub fn new() -> Self {
        let (marks_tx, marks_rx) = mpsc::channel(MARKS_CHANNEL_CAPACITY);
        Self {
            registrations: Mutex::new(Vec::new()),
            health: Arc::new(HealthSink {
                health: Mutex::new(HashMap::new()),
            }),
            marks_tx,
            marks_rx: Mutex::new(Some(marks_rx)),
        }
    }

    /// Registers a feed. Must be called before [`FeedManager::start`].
    pub fn register(&self, adapter: Arc<dyn FeedAdapter>, policy: ReconnectPolicy) {
        self.registrations.lock().push(Registration {
            adapter,
            policy,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        });
    }

    /// Takes the merged tick stream receiver. Can only be taken once.
    pub fn marks(&self) -> Option<mpsc::Receiver<MarketTick>> {
        self.marks_rx.lock().take()
    }

    /// Spawns a supervisor task per registered feed.
    pub fn start(&self) {
        let mut registrations = self.registrations.lock();
        for reg in registrations.iter_mut() {
            let adapter = Arc::clone(&reg.adapter);
            let policy = reg.policy;
            let shutdown = Arc::clone(&reg.shutdown);
            let health = Arc::clone(&self.health) as Arc<dyn FeedHooks>;
            let tx = self.marks_tx.clone();

            let handle = tokio::spawn(async move {
                supervise(adapter, policy, shutdown, tx, health).await;
            });
            reg.handle = Some(handle);
        }
    }

    pub fn health(&self, feed_id: &str) -> Option<FeedHealth> {
        self.health.health.lock().get(feed_id).cloned()
    }

    /// Calls `disconnect` on every feed and signals its supervisor to
    /// stop reconnecting.
    pub async fn stop(&self) {
        let mut registrations = self.registrations.lock();
        for reg in registrations.iter() {
            reg.shutdown.store(true, Ordering::Release);
            if let Err(error) = reg.adapter.disconnect().await {
                error!(feed_id = reg.adapter.id(), ?error, "error disconnecting feed");
            }
        }
        for reg in registrations.iter_mut() {
            if let Some(handle) = reg.handle.take() {
                let _ = handle.await;
            }
        }
    }
}

impl Default for FeedManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn supervise(
    adapter: Arc<dyn FeedAdapter>,
    policy: ReconnectPolicy,
    shutdown: Arc<AtomicBool>,
    tx: mpsc::Sender<MarketTick>,
    hooks: Arc<dyn FeedHooks>,
) {
    let mut attempt: u32 = 0;

    loop {
        if shutdown.load(Ordering::Acquire) {
            return;
        }

        if let Err(error) = adapter.connect(tx.clone(), Arc::clone(&hooks)).await {
            error!(feed_id = adapter.id(), ?error, "feed connection failed");
        }

        if shutdown.load(Ordering::Acquire) {
            return;
        }

        attempt += 1;
        if !policy.allows(attempt) {
            error!(feed_id = adapter.id(), attempt, "feed exceeded max reconnect attempts, giving up");
            hooks.on_status_change(adapter.id(), FeedStatus::Disconnected);
            return;
        }

        hooks.on_reconnect(adapter.id(), attempt);
        tokio::time::sleep(policy.delay_for(attempt)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::HistoricalFeedAdapter;
    use ember_core::MarketTick;

    #[tokio::test]
    async fn manager_merges_ticks_from_registered_feeds() {
        let manager = FeedManager::new();
        let mut rx = manager.marks().unwrap();

        let feed_a = Arc::new(HistoricalFeedAdapter::new(
            "a",
            vec![MarketTick::new(1, "AAA", None, None, Some(1.0), None, None).unwrap()],
        ));
        let feed_b = Arc::new(HistoricalFeedAdapter::new(
            "b",
            vec![MarketTick::new(2, "BBB", None, None, Some(2.0), None, None).unwrap()],
        ));

        manager.register(feed_a, ReconnectPolicy::new(10, 100, 0, Some(0)));
        manager.register(feed_b, ReconnectPolicy::new(10, 100, 0, Some(0)));
        manager.start();

        let mut symbols = Vec::new();
        for _ in 0..2 {
            let tick = rx.recv().await.unwrap();
            symbols.push(tick.symbol);
        }
        symbols.sort();
        assert_eq!(symbols, vec!["AAA".to_string(), "BBB".to_string()]);

        manager.stop().await;
    }

    #[tokio::test]
    async fn health_reflects_last_tick_and_status() {
        let manager = FeedManager::new();
        let mut rx = manager.marks().unwrap();
        let feed = Arc::new(HistoricalFeedAdapter::new(
            "only",
            vec![MarketTick::new(42, "SIM", None, None, Some(1.0), None, None).unwrap()],
        ));
        manager.register(feed, ReconnectPolicy::new(10, 100, 0, Some(0)));
        manager.start();

        let _ = rx.recv().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let health = manager.health("only").unwrap();
        assert_eq!(health.last_tick_ms, Some(42));
        manager.stop().await;
    }
}
