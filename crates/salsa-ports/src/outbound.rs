use std::sync::Arc;

use async_trait::async_trait;

use salsa_core::outage::OutageWindow;
use salsa_core::stage::Stage;

use crate::error::{NotifyError, SourceError};
use crate::types::{Block, MessageHandler, PublishOptions, Topic};

/// Where the current stage and the outage windows for a block come from.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn get_stage(&self) -> Result<Stage, SourceError>;

    /// Windows starting within `[today, today + days]`, sorted by start.
    async fn get_schedule(
        &self,
        stage: Stage,
        block: &Block,
        days: u32,
    ) -> Result<Vec<OutageWindow>, SourceError>;
}

/// Publish/subscribe transport. Topics are relative to the notifier's
/// configured namespace.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(
        &self,
        topic: Topic,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), NotifyError>;

    /// `handler` runs on the transport's delivery task and must not block.
    async fn subscribe(&self, topic: Topic, handler: MessageHandler) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: ScheduleSource + ?Sized> ScheduleSource for Arc<T> {
    async fn get_stage(&self) -> Result<Stage, SourceError> {
        (**self).get_stage().await
    }

    async fn get_schedule(
        &self,
        stage: Stage,
        block: &Block,
        days: u32,
    ) -> Result<Vec<OutageWindow>, SourceError> {
        (**self).get_schedule(stage, block, days).await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn publish(
        &self,
        topic: Topic,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), NotifyError> {
        (**self).publish(topic, payload, options).await
    }

    async fn subscribe(&self, topic: Topic, handler: MessageHandler) -> Result<(), NotifyError> {
        (**self).subscribe(topic, handler).await
    }
}
