use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DomainError;

/// A period during which power is cut for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutageWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl OutageWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start <= now
    }
}

/// Stable sort by start time; windows sharing a start keep source order.
pub fn sort_by_start(windows: &mut [OutageWindow]) {
    windows.sort_by_key(|w| w.start);
}
