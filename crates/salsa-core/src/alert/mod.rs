pub mod builder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

pub use builder::{AlertBuilder, DEFAULT_OFFSETS_MINUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    /// Fires `minutes` before an outage starts.
    OutageWarning { minutes: u32 },
    OutageStart,
    OutageEnd,
    StageChanged { stage: Stage },
}

impl AlertKind {
    /// Wire token consumers match on.
    pub fn token(&self) -> String {
        match self {
            Self::OutageWarning { minutes } => format!("POWER_OUTAGE_IN_{minutes}MIN"),
            Self::OutageStart => "POWER_OUTAGE_START".into(),
            Self::OutageEnd => "POWER_OUTAGE_END".into(),
            Self::StageChanged { stage } if stage.is_active() => "LOAD_SHEDDING_START".into(),
            Self::StageChanged { .. } => "LOAD_SHEDDING_END".into(),
        }
    }
}

/// A notification due at a point in time. Carries data only; the owner
/// decides how to deliver it when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    fire_time: DateTime<Utc>,
    kind: AlertKind,
}

impl AlertEvent {
    pub fn new(fire_time: DateTime<Utc>, kind: AlertKind) -> Self {
        Self { fire_time, kind }
    }

    pub fn fire_time(&self) -> DateTime<Utc> {
        self.fire_time
    }

    pub fn kind(&self) -> AlertKind {
        self.kind
    }
}
