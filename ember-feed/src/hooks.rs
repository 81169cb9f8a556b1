use ember_core::TimestampMs;

/// Connection lifecycle state a [`FeedAdapter`](crate::adapter::FeedAdapter)
/// reports through (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Lifecycle hooks a feed reports into. The manager's supervisor is the
/// usual implementer, updating [`FeedHealth`] and emitting structured
/// logs; adapters call these as their connection progresses rather than
/// returning status out of band.
pub trait FeedHooks: Send + Sync {
    fn on_status_change(&self, feed_id: &str, status: FeedStatus);
    fn on_reconnect(&self, feed_id: &str, attempt: u32);
    fn on_tick(&self, feed_id: &str, ts: TimestampMs);
}

/// Per-feed health snapshot (`spec.md` §4.3's "status, last tick age,
/// reconnect count").
#[derive(Debug, Clone, PartialEq)]
pub struct FeedHealth {
    pub status: FeedStatus,
    pub last_tick_ms: Option<TimestampMs>,
    pub reconnect_count: u32,
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self {
            status: FeedStatus::Disconnected,
            last_tick_ms: None,
            reconnect_count: 0,
        }
    }
}
