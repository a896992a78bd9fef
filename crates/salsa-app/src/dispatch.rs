use chrono::{DateTime, Utc};
use serde::Serialize;

use salsa_core::alert::{AlertEvent, AlertKind};
use salsa_core::stage::Stage;
use salsa_ports::types::{PublishOptions, Topic};

use crate::error::AppError;

/// JSON body published for every notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub alert: String,
    pub stage: u8,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: Topic,
    pub payload: Vec<u8>,
    pub options: PublishOptions,
}

/// Maps an event to what goes on the wire. `stage` is the stage in force
/// when the event fires; stage changes carry their own.
pub fn outbound_for(event: &AlertEvent, stage: Stage) -> Result<Outbound, AppError> {
    let (topic, stage) = match event.kind() {
        AlertKind::StageChanged { stage: new_stage } => (Topic::Stage, new_stage),
        _ => (Topic::Alert, stage),
    };
    let message = AlertMessage {
        alert: event.kind().token(),
        stage: stage.level(),
        at: event.fire_time(),
    };
    Ok(Outbound {
        topic,
        payload: serde_json::to_vec(&message)?,
        options: PublishOptions::ALERT,
    })
}
