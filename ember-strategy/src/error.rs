use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid strategy parameter: {0}")]
    InvalidParams(String),
}
