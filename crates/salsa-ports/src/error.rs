use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("stage source returned negative stage {0}")]
    NegativeStage(i64),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
}
