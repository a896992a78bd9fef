use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Geographic unit whose outage windows are queried, e.g. `3F`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Block(String);

impl Block {
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Block {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Alert,
    Stage,
    Status,
    Sync,
}

impl Topic {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Stage => "stage",
            Self::Status => "status",
            Self::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qos {
    AtMostOnce,
    ExactlyOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub qos: Qos,
    pub retain: bool,
}

impl PublishOptions {
    /// Alerts and stage changes: delivered once, never replayed to late
    /// subscribers.
    pub const ALERT: PublishOptions = PublishOptions {
        qos: Qos::ExactlyOnce,
        retain: false,
    };
}

/// Callback for inbound messages on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;
