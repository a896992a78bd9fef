use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use salsa_ports::error::NotifyError;
use salsa_ports::outbound::Notifier;
use salsa_ports::types::{MessageHandler, PublishOptions, Qos, Topic};

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    #[serde(default)]
    pub client_name: Option<String>,
}

/// Publishes on `{prefix}.{topic}` subjects of a NATS server.
pub struct NatsNotifier {
    client: async_nats::Client,
    prefix: String,
}

impl NatsNotifier {
    pub async fn connect(config: &NatsConfig, prefix: &str) -> Result<Self, NotifyError> {
        let mut options = async_nats::ConnectOptions::new();
        if let Some(name) = &config.client_name {
            options = options.name(name);
        }
        let client = options
            .connect(config.url.as_str())
            .await
            .map_err(|e| NotifyError::Connection(format!("{}: {e}", config.url)))?;

        info!(url = %config.url, prefix, "connected to NATS");
        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    pub fn subject(&self, topic: Topic) -> String {
        subject_for(&self.prefix, topic)
    }
}

pub fn subject_for(prefix: &str, topic: Topic) -> String {
    format!("{prefix}.{}", topic.suffix())
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn publish(
        &self,
        topic: Topic,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), NotifyError> {
        let subject = self.subject(topic);
        if options.retain {
            debug!(subject = %subject, "retain is not supported by NATS core; publishing anyway");
        }

        self.client
            .publish(subject.clone(), Bytes::from(payload))
            .await
            .map_err(|e| NotifyError::PublishFailed(format!("{subject}: {e}")))?;

        if options.qos != Qos::AtMostOnce {
            self.client
                .flush()
                .await
                .map_err(|e| NotifyError::PublishFailed(format!("{subject}: {e}")))?;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: Topic, handler: MessageHandler) -> Result<(), NotifyError> {
        let subject = self.subject(topic);
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| NotifyError::SubscribeFailed(format!("{subject}: {e}")))?;

        info!(subject = %subject, "subscribed");
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                debug!(subject = %message.subject, bytes = message.payload.len(), "message received");
                handler(&message.payload);
            }
            warn!(subject = %subject, "subscription closed");
        });
        Ok(())
    }
}
