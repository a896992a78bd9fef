use salsa_core::error::DomainError;
use salsa_ports::error::{NotifyError, SourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("controller worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("controller worker exited unexpectedly")]
    WorkerExited,
}
