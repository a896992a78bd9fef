use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Load-shedding severity as published by the stage source.
///
/// Level 0 means no outages are scheduled. The "not yet polled" state is
/// modelled by the owner as `Option<Stage>` rather than a sentinel level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stage(u8);

impl Stage {
    pub const NONE: Stage = Stage(0);

    pub fn new(level: u8) -> Self {
        Self(level)
    }

    pub fn from_raw(raw: i64) -> Result<Self, DomainError> {
        if raw < 0 {
            return Err(DomainError::NegativeStage(raw));
        }
        u8::try_from(raw)
            .map(Self)
            .map_err(|_| DomainError::StageOutOfRange(raw))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
