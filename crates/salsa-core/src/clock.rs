use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::minutes(1)).unwrap_or(at)
}

pub fn same_minute(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    truncate_to_minute(a) == truncate_to_minute(b)
}

/// True when `at` lies within the first `epsilon_secs` seconds of its minute.
pub fn within_minute_start(at: DateTime<Utc>, epsilon_secs: u32) -> bool {
    at.second() < epsilon_secs
}

/// True when the minute of the hour is a multiple of `cadence_minutes`.
pub fn aligned_to_cadence(at: DateTime<Utc>, cadence_minutes: u32) -> bool {
    cadence_minutes > 0 && at.minute() % cadence_minutes == 0
}
