//! Execution adapter contract, retry/circuit-breaker policy wrapper,
//! staleness reconciliation, and a paper adapter (`spec.md` §4.7).

pub mod adapter;
pub mod circuit;
pub mod error;
pub mod event;
pub mod paper;
pub mod policy;
pub mod reconciler;
pub mod retry;

pub use adapter::ExecutionAdapter;
pub use circuit::{Admission, CircuitBreaker, CircuitConfig};
pub use error::ExecutionError;
pub use event::ExecutionEvent;
pub use paper::PaperExecutionAdapter;
pub use policy::PolicyWrapper;
pub use reconciler::{Reconciler, ReconcilerConfig, StaleReason};
pub use retry::RetryPolicy;
