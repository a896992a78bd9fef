use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("stage level must be non-negative, got {0}")]
    NegativeStage(i64),
    #[error("stage level {0} is out of range")]
    StageOutOfRange(i64),
    #[error("outage window must start before it ends ({start} .. {end})")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("event at {fire_time} is not in the future (now {now})")]
    EventNotInFuture {
        fire_time: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("event queue is empty")]
    EmptyQueue,
}
