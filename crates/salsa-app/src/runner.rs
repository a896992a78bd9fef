use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use salsa_core::clock::Clock;
use salsa_core::stage::Stage;
use salsa_ports::inbound::StageMonitor;
use salsa_ports::outbound::{Notifier, ScheduleSource};

use crate::controller::ScheduleController;
use crate::error::AppError;
use crate::resync::ResyncTrigger;

/// Owner's side of a running controller worker.
///
/// The worker owns the controller outright. Resync requests reach it over a
/// channel so polls never overlap, and the current stage is mirrored out
/// through a watch channel.
pub struct ControllerHandle {
    cancel: CancellationToken,
    resync: ResyncTrigger,
    stage: watch::Receiver<Option<Stage>>,
    worker: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Spawns the worker and returns immediately. Must be called from
    /// within a tokio runtime.
    pub fn start<S, N, C>(controller: ScheduleController<S, N, C>) -> Self
    where
        S: ScheduleSource + 'static,
        N: Notifier + 'static,
        C: Clock + 'static,
    {
        let cancel = CancellationToken::new();
        let (resync, requests) = ResyncTrigger::channel();
        let (stage_tx, stage) = watch::channel(controller.announced_stage());
        let worker = tokio::spawn(run(controller, cancel.clone(), requests, stage_tx));
        Self {
            cancel,
            resync,
            stage,
            worker: Some(worker),
        }
    }

    pub fn resync_trigger(&self) -> ResyncTrigger {
        self.resync.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Cancels the worker and waits for it to exit. Once this returns no
    /// further notification is published. Calling it again is a no-op.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        self.cancel.cancel();
        match self.worker.take() {
            Some(worker) => worker
                .await
                .map_err(|e| AppError::WorkerPanicked(e.to_string())),
            None => Ok(()),
        }
    }

    /// Resolves when the worker exits. An exit that was not requested
    /// through [`ControllerHandle::stop`] is an error.
    pub async fn closed(&mut self) -> Result<(), AppError> {
        let Some(worker) = self.worker.as_mut() else {
            return Ok(());
        };
        let result = worker.await;
        self.worker = None;
        match result {
            Ok(()) if self.cancel.is_cancelled() => Ok(()),
            Ok(()) => Err(AppError::WorkerExited),
            Err(e) => Err(AppError::WorkerPanicked(e.to_string())),
        }
    }
}

impl StageMonitor for ControllerHandle {
    fn current_stage(&self) -> Option<Stage> {
        *self.stage.borrow()
    }

    fn request_resync(&self) -> bool {
        self.resync.request()
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<S, N, C>(
    mut controller: ScheduleController<S, N, C>,
    cancel: CancellationToken,
    mut requests: mpsc::Receiver<()>,
    stage: watch::Sender<Option<Stage>>,
) where
    S: ScheduleSource,
    N: Notifier,
    C: Clock,
{
    info!(
        block = %controller.config().block(),
        poll_interval_minutes = controller.config().poll_interval_minutes(),
        "schedule controller started"
    );

    controller.poll(false).await;
    stage.send_replace(controller.announced_stage());

    let mut wake = tokio::time::interval(controller.config().wake_interval());
    wake.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Only the wait is raced against cancellation; a tick or poll that
        // has started always runs to completion.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wake.tick() => {
                controller.tick().await;
            }
            Some(()) = requests.recv() => {
                info!("forced resync");
                controller.poll(true).await;
            }
        }

        stage.send_replace(controller.announced_stage());
    }

    controller.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};
    use salsa_core::outage::OutageWindow;
    use salsa_ports::error::{NotifyError, SourceError};
    use salsa_ports::types::{Block, MessageHandler, PublishOptions, Topic};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::config::{AlertConfig, AlertSettings};

    struct FixedSource {
        stage: u8,
        windows: Vec<OutageWindow>,
    }

    #[async_trait]
    impl ScheduleSource for FixedSource {
        async fn get_stage(&self) -> Result<Stage, SourceError> {
            Ok(Stage::new(self.stage))
        }

        async fn get_schedule(
            &self,
            _stage: Stage,
            _block: &Block,
            _days: u32,
        ) -> Result<Vec<OutageWindow>, SourceError> {
            Ok(self.windows.clone())
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl ScheduleSource for PanickingSource {
        async fn get_stage(&self) -> Result<Stage, SourceError> {
            panic!("stage source exploded");
        }

        async fn get_schedule(
            &self,
            _stage: Stage,
            _block: &Block,
            _days: u32,
        ) -> Result<Vec<OutageWindow>, SourceError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        stage_messages: AtomicUsize,
        total: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn publish(
            &self,
            topic: Topic,
            _payload: Vec<u8>,
            _options: PublishOptions,
        ) -> Result<(), NotifyError> {
            if topic == Topic::Stage {
                self.stage_messages.fetch_add(1, Ordering::SeqCst);
            }
            self.total.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn subscribe(
            &self,
            _topic: Topic,
            _handler: MessageHandler,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Wall clock driven by tokio's (pausable) time.
    struct TokioClock {
        base: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn starting_at(s: &str) -> Self {
            Self {
                base: ts(s),
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            self.base + TimeDelta::from_std(self.origin.elapsed()).unwrap()
        }
    }

    /// Answers the first stage query, then stalls and fails.
    struct StallingSource {
        calls: AtomicUsize,
        stall: Duration,
    }

    #[async_trait]
    impl ScheduleSource for StallingSource {
        async fn get_stage(&self) -> Result<Stage, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(Stage::new(2));
            }
            tokio::time::sleep(self.stall).await;
            Err(SourceError::Unavailable("stage feed down".into()))
        }

        async fn get_schedule(
            &self,
            _stage: Stage,
            _block: &Block,
            _days: u32,
        ) -> Result<Vec<OutageWindow>, SourceError> {
            Ok(vec![OutageWindow::new(
                ts("2024-01-01T18:00:00Z"),
                ts("2024-01-01T20:00:00Z"),
            )
            .unwrap()])
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn publish(
            &self,
            _topic: Topic,
            payload: Vec<u8>,
            _options: PublishOptions,
        ) -> Result<(), NotifyError> {
            let body: serde_json::Value = serde_json::from_slice(&payload).unwrap();
            self.alerts
                .lock()
                .unwrap()
                .push(body["alert"].as_str().unwrap().to_string());
            Ok(())
        }

        async fn subscribe(
            &self,
            _topic: Topic,
            _handler: MessageHandler,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    async fn run_across_half_past(resync_at: Option<Duration>) -> Vec<String> {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = StallingSource {
            calls: AtomicUsize::new(0),
            stall: Duration::from_secs(6),
        };
        let controller = ScheduleController::new(
            AlertConfig::try_from(AlertSettings::for_block("3F")).unwrap(),
            source,
            notifier.clone(),
            TokioClock::starting_at("2024-01-01T17:29:50Z"),
        );

        let mut handle = ControllerHandle::start(controller);
        let mut elapsed = Duration::ZERO;
        if let Some(at) = resync_at {
            tokio::time::sleep(at).await;
            assert!(handle.request_resync());
            elapsed = at;
        }
        // run until 17:31:10
        tokio::time::sleep(Duration::from_secs(80) - elapsed).await;
        handle.stop().await.unwrap();

        let alerts = notifier.alerts.lock().unwrap().clone();
        alerts
    }

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fast_config() -> AlertConfig {
        let mut settings = AlertSettings::for_block("3F");
        settings.wake_interval_ms = 10;
        AlertConfig::try_from(settings).unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock(Mutex::new(ts("2024-01-01T12:00:00Z"))))
    }

    fn source() -> FixedSource {
        FixedSource {
            stage: 2,
            windows: vec![OutageWindow::new(
                ts("2024-01-01T18:00:00Z"),
                ts("2024-01-01T20:00:00Z"),
            )
            .unwrap()],
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn start_polls_and_exposes_stage() {
        let notifier = Arc::new(CountingNotifier::default());
        let controller =
            ScheduleController::new(fast_config(), source(), notifier.clone(), clock());

        let mut handle = ControllerHandle::start(controller);
        wait_until(|| handle.current_stage() == Some(Stage::new(2))).await;

        assert!(handle.is_running());
        assert_eq!(notifier.stage_messages.load(Ordering::SeqCst), 1);

        handle.stop().await.unwrap();
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn resync_request_republishes_stage() {
        let notifier = Arc::new(CountingNotifier::default());
        let controller =
            ScheduleController::new(fast_config(), source(), notifier.clone(), clock());

        let mut handle = ControllerHandle::start(controller);
        wait_until(|| notifier.stage_messages.load(Ordering::SeqCst) == 1).await;

        assert!(handle.request_resync());
        wait_until(|| notifier.stage_messages.load(Ordering::SeqCst) == 2).await;

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_rejects_later_resyncs() {
        let notifier = Arc::new(CountingNotifier::default());
        let controller =
            ScheduleController::new(fast_config(), source(), notifier.clone(), clock());

        let mut handle = ControllerHandle::start(controller);
        let trigger = handle.resync_trigger();

        handle.stop().await.unwrap();
        handle.stop().await.unwrap();
        handle.closed().await.unwrap();

        assert!(!trigger.request());
        assert!(!handle.request_resync());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn nothing_published_after_stop_under_resync_load() {
        let notifier = Arc::new(CountingNotifier::default());
        let controller =
            ScheduleController::new(fast_config(), source(), notifier.clone(), clock());

        let mut handle = ControllerHandle::start(controller);
        let mut spammers = Vec::new();
        for _ in 0..8 {
            let trigger = handle.resync_trigger();
            spammers.push(tokio::spawn(async move {
                while trigger.request() {
                    tokio::task::yield_now().await;
                }
            }));
        }

        wait_until(|| notifier.stage_messages.load(Ordering::SeqCst) >= 3).await;
        handle.stop().await.unwrap();
        let published = notifier.total.load(Ordering::SeqCst);

        for spammer in spammers {
            spammer.await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(notifier.total.load(Ordering::SeqCst), published);
    }

    #[tokio::test(start_paused = true)]
    async fn half_past_warning_fires_without_resync() {
        let alerts = run_across_half_past(None).await;
        assert_eq!(alerts, vec!["LOAD_SHEDDING_START", "POWER_OUTAGE_IN_30MIN"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_failing_resync_before_the_minute_loses_no_alerts() {
        // the resync starts at 17:29:57 and holds the worker until 17:30:03
        let alerts = run_across_half_past(Some(Duration::from_secs(7))).await;
        assert_eq!(alerts, vec!["LOAD_SHEDDING_START", "POWER_OUTAGE_IN_30MIN"]);
    }

    #[tokio::test]
    async fn panicked_worker_is_surfaced() {
        let controller = ScheduleController::new(
            fast_config(),
            PanickingSource,
            Arc::new(CountingNotifier::default()),
            clock(),
        );

        let mut handle = ControllerHandle::start(controller);
        let result = handle.closed().await;

        assert!(matches!(result, Err(AppError::WorkerPanicked(_))));
        assert!(handle.stop().await.is_ok());
    }
}
