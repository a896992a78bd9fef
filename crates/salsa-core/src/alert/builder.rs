use chrono::{DateTime, TimeDelta, Utc};

use super::{AlertEvent, AlertKind};
use crate::outage::{sort_by_start, OutageWindow};
use crate::stage::Stage;

pub const DEFAULT_OFFSETS_MINUTES: [u32; 5] = [30, 15, 10, 5, 0];

/// Turns outage windows into the notifications due for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertBuilder {
    offsets: Vec<u32>,
}

impl AlertBuilder {
    pub fn new(offsets: Vec<u32>) -> Self {
        Self { offsets }
    }

    /// Warnings plus start and end.
    pub fn events_per_window(&self) -> usize {
        self.offsets.len() + 2
    }

    /// Windows that already started at `now` are skipped entirely. Per
    /// window the events come out as warnings (in configured order), then
    /// start, then end, so equal fire times keep that order once queued.
    pub fn build(
        &self,
        stage: Stage,
        windows: &[OutageWindow],
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        if !stage.is_active() {
            return vec![];
        }

        let mut sorted = windows.to_vec();
        sort_by_start(&mut sorted);

        let mut events = Vec::with_capacity(sorted.len() * self.events_per_window());
        for window in sorted.iter().filter(|w| !w.has_started(now)) {
            self.push_window(window, &mut events);
        }
        events
    }

    fn push_window(&self, window: &OutageWindow, events: &mut Vec<AlertEvent>) {
        let start = window.start();
        for &minutes in &self.offsets {
            events.push(AlertEvent::new(
                start - TimeDelta::minutes(i64::from(minutes)),
                AlertKind::OutageWarning { minutes },
            ));
        }
        events.push(AlertEvent::new(start, AlertKind::OutageStart));
        events.push(AlertEvent::new(window.end(), AlertKind::OutageEnd));
    }
}

impl Default for AlertBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSETS_MINUTES.to_vec())
    }
}
