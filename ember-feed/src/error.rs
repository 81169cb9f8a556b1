use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed {id} failed to connect: {reason}")]
    Connect { id: String, reason: String },

    #[error("feed {id} disconnected: {reason}")]
    Disconnected { id: String, reason: String },

    #[error("feed {id} exceeded max reconnect attempts ({attempts})")]
    MaxAttemptsExceeded { id: String, attempts: u32 },
}
