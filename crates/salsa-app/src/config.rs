use std::time::Duration;

use serde::Deserialize;

use salsa_core::alert::DEFAULT_OFFSETS_MINUTES;
use salsa_ports::types::Block;

use crate::error::AppError;

const MAX_OFFSET_MINUTES: u32 = 24 * 60;

/// Raw alert settings as read from the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertSettings {
    pub block: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u32,
    #[serde(default = "default_offsets")]
    pub pre_alert_offsets_minutes: Vec<u32>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_schedule_days")]
    pub schedule_days: u32,
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_wake_interval")]
    pub wake_interval_ms: u64,
    #[serde(default = "default_wake_epsilon")]
    pub wake_epsilon_secs: u32,
}

fn default_poll_interval() -> u32 {
    5
}

fn default_offsets() -> Vec<u32> {
    DEFAULT_OFFSETS_MINUTES.to_vec()
}

fn default_topic_prefix() -> String {
    "salsa".to_string()
}

fn default_schedule_days() -> u32 {
    2
}

fn default_source_timeout() -> u64 {
    30
}

fn default_wake_interval() -> u64 {
    2_000
}

fn default_wake_epsilon() -> u32 {
    2
}

impl AlertSettings {
    pub fn for_block(block: &str) -> Self {
        Self {
            block: block.to_string(),
            poll_interval_minutes: default_poll_interval(),
            pre_alert_offsets_minutes: default_offsets(),
            topic_prefix: default_topic_prefix(),
            schedule_days: default_schedule_days(),
            source_timeout_secs: default_source_timeout(),
            wake_interval_ms: default_wake_interval(),
            wake_epsilon_secs: default_wake_epsilon(),
        }
    }
}

/// Validated, immutable controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    block: Block,
    poll_interval_minutes: u32,
    pre_alert_offsets_minutes: Vec<u32>,
    topic_prefix: String,
    schedule_days: u32,
    source_timeout: Duration,
    wake_interval: Duration,
    wake_epsilon_secs: u32,
}

impl TryFrom<AlertSettings> for AlertConfig {
    type Error = AppError;

    fn try_from(settings: AlertSettings) -> Result<Self, Self::Error> {
        let block = Block::new(&settings.block);
        if block.is_empty() {
            return Err(AppError::Config("block must not be empty".into()));
        }
        if !(1..=60).contains(&settings.poll_interval_minutes) {
            return Err(AppError::Config(format!(
                "poll_interval_minutes must be within 1..=60, got {}",
                settings.poll_interval_minutes
            )));
        }
        if let Some(bad) = settings
            .pre_alert_offsets_minutes
            .iter()
            .find(|&&m| m > MAX_OFFSET_MINUTES)
        {
            return Err(AppError::Config(format!(
                "pre-alert offset {bad} exceeds {MAX_OFFSET_MINUTES} minutes"
            )));
        }
        let topic_prefix = settings.topic_prefix.trim().to_string();
        if topic_prefix.is_empty() {
            return Err(AppError::Config("topic_prefix must not be empty".into()));
        }
        if settings.schedule_days == 0 {
            return Err(AppError::Config("schedule_days must be at least 1".into()));
        }
        if settings.source_timeout_secs == 0 {
            return Err(AppError::Config("source_timeout_secs must be non-zero".into()));
        }
        if settings.wake_interval_ms == 0 {
            return Err(AppError::Config("wake_interval_ms must be non-zero".into()));
        }
        let wake_interval = Duration::from_millis(settings.wake_interval_ms);
        // Every minute must contain at least one wake inside the epsilon.
        if Duration::from_secs(u64::from(settings.wake_epsilon_secs)) < wake_interval
            || settings.wake_epsilon_secs >= 60
        {
            return Err(AppError::Config(format!(
                "wake_epsilon_secs ({}) must cover wake_interval_ms ({}) and stay below 60",
                settings.wake_epsilon_secs, settings.wake_interval_ms
            )));
        }

        let mut offsets = Vec::with_capacity(settings.pre_alert_offsets_minutes.len());
        for m in settings.pre_alert_offsets_minutes {
            if !offsets.contains(&m) {
                offsets.push(m);
            }
        }

        Ok(Self {
            block,
            poll_interval_minutes: settings.poll_interval_minutes,
            pre_alert_offsets_minutes: offsets,
            topic_prefix,
            schedule_days: settings.schedule_days,
            source_timeout: Duration::from_secs(settings.source_timeout_secs),
            wake_interval,
            wake_epsilon_secs: settings.wake_epsilon_secs,
        })
    }
}

impl AlertConfig {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn poll_interval_minutes(&self) -> u32 {
        self.poll_interval_minutes
    }

    pub fn pre_alert_offsets_minutes(&self) -> &[u32] {
        &self.pre_alert_offsets_minutes
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn schedule_days(&self) -> u32 {
        self.schedule_days
    }

    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    pub fn wake_interval(&self) -> Duration {
        self.wake_interval
    }

    pub fn wake_epsilon_secs(&self) -> u32 {
        self.wake_epsilon_secs
    }
}
