use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use salsa_core::alert::{AlertBuilder, AlertEvent, AlertKind};
use salsa_core::clock::{
    aligned_to_cadence, same_minute, truncate_to_minute, within_minute_start, Clock,
};
use salsa_core::outage::OutageWindow;
use salsa_core::queue::EventQueue;
use salsa_core::stage::Stage;
use salsa_ports::error::SourceError;
use salsa_ports::outbound::{Notifier, ScheduleSource};

use crate::config::AlertConfig;
use crate::dispatch::outbound_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Stage query failed or timed out; nothing changed.
    SourceFailed,
    Unchanged(Stage),
    Rebuilt {
        stage: Stage,
        scheduled: usize,
        rejected: usize,
    },
    /// The stage was announced but its windows could not be fetched; the
    /// previous schedule stays in place and the next poll retries.
    RebuildFailed(Stage),
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// False when the wake fell outside the start of a minute or the minute
    /// was already handled.
    pub processed: bool,
    pub poll: Option<PollOutcome>,
    pub discarded: usize,
    pub fired: usize,
}

/// Tracks the stage and turns outage windows into timed notifications.
pub struct ScheduleController<S, N, C>
where
    S: ScheduleSource,
    N: Notifier,
    C: Clock,
{
    config: AlertConfig,
    builder: AlertBuilder,
    source: S,
    notifier: N,
    clock: C,
    announced_stage: Option<Stage>,
    current_stage: Option<Stage>,
    queue: EventQueue,
    last_minute: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    stopped: bool,
}

impl<S, N, C> ScheduleController<S, N, C>
where
    S: ScheduleSource,
    N: Notifier,
    C: Clock,
{
    pub fn new(config: AlertConfig, source: S, notifier: N, clock: C) -> Self {
        let builder = AlertBuilder::new(config.pre_alert_offsets_minutes().to_vec());
        Self {
            config,
            builder,
            source,
            notifier,
            clock,
            announced_stage: None,
            current_stage: None,
            queue: EventQueue::new(),
            last_minute: None,
            last_seen: None,
            stopped: false,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Latest stage reported by the source and published.
    pub fn announced_stage(&self) -> Option<Stage> {
        self.announced_stage
    }

    /// Stage the pending queue was built for. Lags the announced stage
    /// while a rebuild is failing.
    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Queries the stage. A new stage, or any stage when `force` is set, is
    /// published straight away; the queue is then rebuilt from freshly
    /// fetched windows. The new queue is staged before it replaces the
    /// current one, so a failed fetch leaves the current schedule untouched
    /// and the rebuild is retried on the next poll.
    pub async fn poll(&mut self, force: bool) -> PollOutcome {
        if self.stopped {
            return PollOutcome::Stopped;
        }
        self.last_seen = Some(self.clock.now());

        let stage = match self.fetch_stage().await {
            Ok(stage) => stage,
            Err(e) => {
                error!(
                    error = %e,
                    current_stage = ?self.current_stage,
                    "stage query failed, keeping current schedule"
                );
                return PollOutcome::SourceFailed;
            }
        };

        let announce = force || self.announced_stage != Some(stage);
        if !announce && self.current_stage == Some(stage) {
            debug!(%stage, "stage unchanged");
            return PollOutcome::Unchanged(stage);
        }

        if announce {
            let previous = self.announced_stage.replace(stage);
            info!(previous = ?previous, %stage, forced = force, "stage announced");
            self.fire(AlertEvent::new(
                self.clock.now(),
                AlertKind::StageChanged { stage },
            ))
            .await;
        }

        let windows = if stage.is_active() {
            match self.fetch_schedule(stage).await {
                Ok(windows) => windows,
                Err(e) => {
                    error!(
                        error = %e,
                        %stage,
                        current_stage = ?self.current_stage,
                        block = %self.config.block(),
                        "schedule fetch failed, keeping current schedule"
                    );
                    return PollOutcome::RebuildFailed(stage);
                }
            }
        } else {
            vec![]
        };

        let now = self.clock.now();
        let (staged, rejected) = self.stage_queue(stage, &windows, now);
        let scheduled = staged.len();

        let previous = self.current_stage.replace(stage);
        self.queue = staged;
        info!(
            previous = ?previous,
            %stage,
            windows = windows.len(),
            scheduled,
            rejected,
            "schedule rebuilt"
        );

        PollOutcome::Rebuilt {
            stage,
            scheduled,
            rejected,
        }
    }

    /// One wake of the worker loop. Only the first wake inside a minute's
    /// epsilon does any work: poll when the minute is on the cadence, then
    /// discard overdue events, then fire events due this minute.
    ///
    /// A wake that lands past the epsilon because the worker was busy
    /// across the minute boundary (a slow resync, say) still handles that
    /// minute: the last clock reading before it belongs to an earlier one.
    pub async fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let previous = self.last_seen.replace(now);
        if self.stopped {
            return TickReport::default();
        }

        let minute = truncate_to_minute(now);
        if self.last_minute == Some(minute) {
            return TickReport::default();
        }
        let delayed = previous.is_some_and(|seen| seen < minute);
        if !within_minute_start(now, self.config.wake_epsilon_secs()) {
            if !delayed {
                return TickReport::default();
            }
            warn!(%minute, %now, "minute start missed while busy, handling it late");
        }
        self.last_minute = Some(minute);

        let mut report = TickReport {
            processed: true,
            ..TickReport::default()
        };

        if aligned_to_cadence(minute, self.config.poll_interval_minutes()) {
            report.poll = Some(self.poll(false).await);
        }

        report.discarded = self.discard_overdue(minute);
        report.fired = self.fire_due(minute).await;

        if report.fired > 0 || report.discarded > 0 {
            debug!(
                %minute,
                fired = report.fired,
                discarded = report.discarded,
                pending = self.queue.len(),
                "tick processed"
            );
        }
        report
    }

    /// Clears pending events; no further polls or notifications happen.
    pub fn shutdown(&mut self) {
        self.stopped = true;
        let dropped = self.queue.len();
        self.queue.clear();
        info!(dropped, "schedule controller stopped");
    }

    fn stage_queue(
        &self,
        stage: Stage,
        windows: &[OutageWindow],
        now: DateTime<Utc>,
    ) -> (EventQueue, usize) {
        let mut staged = EventQueue::new();
        let mut rejected = 0;
        for event in self.builder.build(stage, windows, now) {
            if let Err(e) = staged.insert(event, now) {
                rejected += 1;
                warn!(
                    error = %e,
                    kind = ?event.kind(),
                    fire_time = %event.fire_time(),
                    %stage,
                    "not scheduling event that is already due"
                );
            }
        }
        (staged, rejected)
    }

    fn discard_overdue(&mut self, minute: DateTime<Utc>) -> usize {
        let mut discarded = 0;
        while self.queue.peek().is_ok_and(|e| e.fire_time() < minute) {
            if let Ok(event) = self.queue.pop() {
                discarded += 1;
                warn!(
                    kind = ?event.kind(),
                    fire_time = %event.fire_time(),
                    %minute,
                    "past event identified, discarding"
                );
            }
        }
        discarded
    }

    async fn fire_due(&mut self, minute: DateTime<Utc>) -> usize {
        let mut fired = 0;
        while self
            .queue
            .peek()
            .is_ok_and(|e| same_minute(e.fire_time(), minute))
        {
            if let Ok(event) = self.queue.pop() {
                self.fire(event).await;
                fired += 1;
            }
        }
        fired
    }

    /// Publishes without retry; failures are logged and the event is gone.
    async fn fire(&self, event: AlertEvent) {
        let stage = self.current_stage.unwrap_or(Stage::NONE);
        let outbound = match outbound_for(&event, stage) {
            Ok(outbound) => outbound,
            Err(e) => {
                error!(error = %e, kind = ?event.kind(), "failed to encode notification");
                return;
            }
        };
        let topic = outbound.topic;
        match self
            .notifier
            .publish(topic, outbound.payload, outbound.options)
            .await
        {
            Ok(()) => info!(
                topic = topic.suffix(),
                alert = %event.kind().token(),
                fire_time = %event.fire_time(),
                %stage,
                "notification published"
            ),
            Err(e) => error!(
                error = %e,
                topic = topic.suffix(),
                alert = %event.kind().token(),
                %stage,
                "notification publish failed"
            ),
        }
    }

    async fn fetch_stage(&self) -> Result<Stage, SourceError> {
        self.bounded(self.source.get_stage()).await
    }

    async fn fetch_schedule(&self, stage: Stage) -> Result<Vec<OutageWindow>, SourceError> {
        self.bounded(self.source.get_schedule(
            stage,
            self.config.block(),
            self.config.schedule_days(),
        ))
        .await
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        let limit = self.config.source_timeout();
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(SourceError::Timeout(limit)))
    }
}
