use async_trait::async_trait;
use tracing::{info, warn};

use salsa_ports::error::NotifyError;
use salsa_ports::outbound::Notifier;
use salsa_ports::types::{MessageHandler, PublishOptions, Topic};

/// Writes every notification to the log instead of a broker.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    prefix: String,
}

impl LogNotifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(
        &self,
        topic: Topic,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), NotifyError> {
        let subject = format!("{}.{}", self.prefix, topic.suffix());
        info!(
            subject = %subject,
            qos = ?options.qos,
            payload = %String::from_utf8_lossy(&payload),
            "notification"
        );
        Ok(())
    }

    async fn subscribe(&self, topic: Topic, _handler: MessageHandler) -> Result<(), NotifyError> {
        warn!(topic = topic.suffix(), "no broker configured, subscription ignored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn publish_and_subscribe_always_succeed() {
        let notifier = LogNotifier::new("salsa");
        notifier
            .publish(Topic::Alert, b"{}".to_vec(), PublishOptions::ALERT)
            .await
            .unwrap();
        notifier
            .subscribe(Topic::Sync, Arc::new(|_: &[u8]| {}))
            .await
            .unwrap();
    }
}
