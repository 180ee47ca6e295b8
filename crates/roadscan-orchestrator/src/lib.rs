//! Fixed-rate sampler coordinating frame source, predictor, and publisher.

pub mod clock;

use std::sync::{Arc, Mutex};

use roadscan_engine::{ModelExecutor, RoadTypePredictor};
use roadscan_media::FrameSource;
use roadscan_network::ResultPublisher;
use roadscan_ops::{PerformanceProbe, TelemetryStore};
use roadscan_types::{
    config::SamplerConfig,
    events::{LifecyclePhase, PredictionEvent, SystemEvent},
    road::{Prediction, RoadType},
    telemetry::PerformanceSample,
    Result, RoadscanError,
};
use tokio::{
    sync::watch,
    task,
    time::{interval_at, Duration, Instant},
};
use tracing::{debug, error, info, warn};

pub use clock::PlaybackClock;

/// Whether ticks should classify frames. Read fresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Enabled,
    Disabled,
}

impl SamplerState {
    pub fn toggled(self) -> Self {
        match self {
            SamplerState::Enabled => SamplerState::Disabled,
            SamplerState::Disabled => SamplerState::Enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Skipped,
    /// The source had no frame; the previous label stands.
    NoFrame { position_ms: u64 },
    Classified {
        prediction: Prediction,
        position_ms: u64,
    },
    /// Fetch, preprocessing or inference failed; the label is now unknown.
    Failed { position_ms: u64, reason: String },
}

pub struct Sampler<S, E, N>
where
    S: FrameSource,
    E: ModelExecutor + 'static,
    N: ResultPublisher,
{
    source: S,
    predictor: Arc<Mutex<RoadTypePredictor<E>>>,
    publisher: N,
    telemetry: TelemetryStore,
    probe: PerformanceProbe,
    clock: PlaybackClock,
    config: SamplerConfig,
    last_label: RoadType,
}

impl<S, E, N> Sampler<S, E, N>
where
    S: FrameSource,
    E: ModelExecutor + 'static,
    N: ResultPublisher,
{
    pub fn new(
        config: SamplerConfig,
        source: S,
        predictor: RoadTypePredictor<E>,
        publisher: N,
        telemetry: TelemetryStore,
        clock: PlaybackClock,
    ) -> Self {
        let probe = PerformanceProbe::new(Duration::from_millis(config.cpu_window_ms));
        Self {
            source,
            predictor: Arc::new(Mutex::new(predictor)),
            publisher,
            telemetry,
            probe,
            clock,
            config,
            last_label: RoadType::Unknown,
        }
    }

    pub fn last_label(&self) -> RoadType {
        self.last_label
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs one sampling step. Never fails; problems become the outcome.
    pub async fn tick(&mut self, state: SamplerState) -> TickOutcome {
        if state == SamplerState::Disabled {
            return TickOutcome::Skipped;
        }
        self.telemetry.update_session(|s| s.ticks += 1).await;

        let position_ms = self.clock.position_ms();
        debug!("Sampling video at {}ms", position_ms);
        match self.classify_at(position_ms).await {
            Ok(Some((prediction, performance))) => {
                info!(
                    "Road type {} at {}ms ({:.1} ms)",
                    prediction.label, position_ms, prediction.inference_ms
                );
                self.last_label = prediction.label;
                let sample = performance.clone();
                self.telemetry
                    .update_session(|s| {
                        s.classified += 1;
                        s.last_sample = Some(sample);
                    })
                    .await;
                let event = SystemEvent::prediction(PredictionEvent::Classified {
                    prediction: prediction.clone(),
                    position_ms,
                    performance,
                });
                publish_and_record(&self.publisher, &self.telemetry, event).await;
                TickOutcome::Classified {
                    prediction,
                    position_ms,
                }
            }
            Ok(None) => {
                error!("No frame available at {}ms", position_ms);
                self.telemetry.update_session(|s| s.missing_frames += 1).await;
                TickOutcome::NoFrame { position_ms }
            }
            Err(err) => {
                error!("Inference tick failed at {}ms: {err}", position_ms);
                self.last_label = RoadType::Unknown;
                self.telemetry.update_session(|s| s.failures += 1).await;
                let reason = err.to_string();
                let event = SystemEvent::prediction(PredictionEvent::Failed {
                    position_ms,
                    reason: reason.clone(),
                });
                publish_and_record(&self.publisher, &self.telemetry, event).await;
                TickOutcome::Failed {
                    position_ms,
                    reason,
                }
            }
        }
    }

    /// Starts or stops playback and announces the change.
    pub async fn apply_state(&mut self, state: SamplerState) {
        match state {
            SamplerState::Enabled => {
                info!("Inference started");
                self.clock.play();
                let event = SystemEvent::lifecycle(
                    LifecyclePhase::InferenceStarted,
                    Some(self.describe_executor()),
                );
                publish_and_record(&self.publisher, &self.telemetry, event).await;
            }
            SamplerState::Disabled => {
                info!("Inference stopped");
                self.clock.pause();
                self.last_label = RoadType::Unknown;
                for event in [
                    SystemEvent::lifecycle(LifecyclePhase::InferenceStopped, None),
                    SystemEvent::prediction(PredictionEvent::Reset),
                ] {
                    publish_and_record(&self.publisher, &self.telemetry, event).await;
                }
            }
        }
    }

    /// Ticks at a fixed rate until the control sender is dropped.
    pub async fn run(&mut self, mut control: watch::Receiver<SamplerState>) -> Result<()> {
        if self.config.interval_ms == 0 {
            return Err(orchestrator_error("sampler interval must be positive"));
        }
        let period = Duration::from_millis(self.config.interval_ms);
        let initial = *control.borrow_and_update();
        self.apply_state(initial).await;

        let start = Instant::now() + Duration::from_millis(self.config.initial_delay_ms);
        let mut ticker = interval_at(start, period);
        info!(
            "Sampler running every {}ms (initial delay {}ms)",
            self.config.interval_ms, self.config.initial_delay_ms
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let state = *control.borrow();
                    self.tick(state).await;
                }
                changed = control.changed() => {
                    if changed.is_err() {
                        info!("Sampler control closed; stopping");
                        break;
                    }
                    let state = *control.borrow_and_update();
                    self.apply_state(state).await;
                }
            }
        }
        Ok(())
    }

    fn describe_executor(&self) -> String {
        self.predictor
            .lock()
            .map(|predictor| predictor.executor().describe())
            .unwrap_or_else(|_| "unavailable".into())
    }

    async fn classify_at(
        &mut self,
        position_ms: u64,
    ) -> Result<Option<(Prediction, PerformanceSample)>> {
        let Some(frame) = self.source.frame_at(position_ms).await? else {
            return Ok(None);
        };
        let predictor = Arc::clone(&self.predictor);
        let prediction = task::spawn_blocking(move || {
            let mut predictor = predictor
                .lock()
                .map_err(|_| orchestrator_error("predictor lock poisoned"))?;
            predictor.predict(&frame)
        })
        .await
        .map_err(|err| orchestrator_error(format!("inference task failed: {err}")))??;
        let performance = self.probe.sample(prediction.inference_ms).await;
        debug!("Performance: {}", performance.to_string().replace('\n', ", "));
        Ok(Some((prediction, performance)))
    }
}

/// Publishes `event`, then keeps a copy in the telemetry store.
async fn publish_and_record<N: ResultPublisher>(
    publisher: &N,
    telemetry: &TelemetryStore,
    event: SystemEvent,
) {
    let cloned = event.clone();
    if let Err(err) = publisher.publish(event).await {
        warn!("Failed to publish event: {err}");
    }
    if let Err(err) = telemetry.record_event(cloned).await {
        warn!("Failed to record event: {err}");
    }
}

pub fn orchestrator_error(message: impl Into<String>) -> RoadscanError {
    RoadscanError::Orchestrator(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use roadscan_engine::StaticExecutor;
    use roadscan_media::MockFrameSource;
    use roadscan_network::LocalPublisher;
    use roadscan_types::{
        events::{EventPayload, LifecyclePhase},
        tensor::{InputTensor, ScoreVector},
        vision::ImageFrame,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> SamplerConfig {
        SamplerConfig {
            interval_ms: 20,
            initial_delay_ms: 0,
            cpu_window_ms: 1,
        }
    }

    fn gravel() -> StaticExecutor {
        StaticExecutor::new(ScoreVector::new([0.1, 0.1, 0.7, 0.05, 0.05]))
    }

    fn sampler<S: FrameSource>(
        source: S,
        executor: StaticExecutor,
        publisher: LocalPublisher,
        telemetry: TelemetryStore,
    ) -> Sampler<S, StaticExecutor, LocalPublisher> {
        Sampler::new(
            config(),
            source,
            RoadTypePredictor::new(executor),
            publisher,
            telemetry,
            PlaybackClock::new(Some(10_000), true),
        )
    }

    #[tokio::test]
    async fn disabled_tick_never_touches_source() {
        let source = MockFrameSource::new(ImageFrame::solid(360, 360, [0, 0, 0]));
        let mut sampler = sampler(source, gravel(), LocalPublisher::new(8), TelemetryStore::new());
        assert!(matches!(
            sampler.tick(SamplerState::Disabled).await,
            TickOutcome::Skipped
        ));
        assert!(sampler.source().requests().is_empty());
    }

    #[tokio::test]
    async fn enabled_tick_classifies_and_publishes() {
        let publisher = LocalPublisher::new(8);
        let mut events = publisher.subscribe();
        let telemetry = TelemetryStore::new();
        let source = MockFrameSource::new(ImageFrame::solid(640, 360, [120, 110, 100]));
        let mut sampler = sampler(source, gravel(), publisher, telemetry.clone());

        match sampler.tick(SamplerState::Enabled).await {
            TickOutcome::Classified { prediction, .. } => {
                assert_eq!(prediction.label, RoadType::Gravel)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(sampler.last_label(), RoadType::Gravel);

        let event = events.next().await.expect("event");
        assert!(matches!(
            event.payload,
            EventPayload::Prediction(PredictionEvent::Classified { .. })
        ));
        let session = telemetry.session().await;
        assert_eq!((session.ticks, session.classified), (1, 1));
        assert!(session.last_sample.is_some());
    }

    #[tokio::test]
    async fn missing_frame_keeps_previous_label() {
        let telemetry = TelemetryStore::new();
        let mut sampler = sampler(
            MockFrameSource::missing(),
            gravel(),
            LocalPublisher::new(8),
            telemetry.clone(),
        );
        sampler.last_label = RoadType::Asphalt;
        assert!(matches!(
            sampler.tick(SamplerState::Enabled).await,
            TickOutcome::NoFrame { .. }
        ));
        assert_eq!(sampler.last_label(), RoadType::Asphalt);
        assert!(telemetry.snapshot_events().await.is_empty());
        assert_eq!(telemetry.session().await.missing_frames, 1);
    }

    #[tokio::test]
    async fn failures_fall_back_to_unknown() {
        let telemetry = TelemetryStore::new();
        let mut sampler = sampler(
            MockFrameSource::failing("decoder crashed"),
            gravel(),
            LocalPublisher::new(8),
            telemetry.clone(),
        );
        sampler.last_label = RoadType::Dirt;
        assert!(matches!(
            sampler.tick(SamplerState::Enabled).await,
            TickOutcome::Failed { .. }
        ));
        assert_eq!(sampler.last_label(), RoadType::Unknown);

        let mut sampler = self::sampler(
            MockFrameSource::new(ImageFrame::solid(360, 360, [0, 0, 0])),
            StaticExecutor::failing("session poisoned"),
            LocalPublisher::new(8),
            telemetry.clone(),
        );
        match sampler.tick(SamplerState::Enabled).await {
            TickOutcome::Failed { reason, .. } => assert!(reason.contains("session poisoned")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(telemetry.session().await.failures, 2);
    }

    struct SlowExecutor(Duration);

    impl ModelExecutor for SlowExecutor {
        fn run(&mut self, _input: &InputTensor) -> Result<ScoreVector> {
            std::thread::sleep(self.0);
            Ok(ScoreVector::new([0.9, 0.0, 0.0, 0.0, 0.1]))
        }

        fn describe(&self) -> String {
            "slow".into()
        }
    }

    #[tokio::test]
    async fn inference_leaves_the_runtime_free() {
        let counter = Arc::new(AtomicU32::new(0));
        let background = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let mut sampler = Sampler::new(
            config(),
            MockFrameSource::new(ImageFrame::solid(360, 360, [0, 0, 0])),
            RoadTypePredictor::new(SlowExecutor(Duration::from_millis(200))),
            LocalPublisher::new(8),
            TelemetryStore::new(),
            PlaybackClock::new(Some(10_000), true),
        );
        assert!(matches!(
            sampler.tick(SamplerState::Enabled).await,
            TickOutcome::Classified { .. }
        ));
        background.abort();
        assert!(counter.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test]
    async fn empty_frame_is_a_tick_failure() {
        let mut sampler = sampler(
            MockFrameSource::new(ImageFrame::empty()),
            gravel(),
            LocalPublisher::new(8),
            TelemetryStore::new(),
        );
        assert!(matches!(
            sampler.tick(SamplerState::Enabled).await,
            TickOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn run_follows_control_channel_until_closed() {
        let telemetry = TelemetryStore::new();
        let source = MockFrameSource::new(ImageFrame::solid(360, 360, [255, 255, 255]));
        let mut sampler = sampler(source, gravel(), LocalPublisher::new(32), telemetry.clone());
        let (tx, rx) = watch::channel(SamplerState::Enabled);

        let handle = tokio::spawn(async move {
            sampler.run(rx).await.expect("run");
            sampler
        });
        tokio::time::sleep(Duration::from_millis(120)).await;
        tx.send(SamplerState::Disabled).expect("disable");
        tokio::time::sleep(Duration::from_millis(40)).await;
        drop(tx);

        let sampler = handle.await.expect("join");
        assert!(!sampler.clock().is_playing());
        assert_eq!(sampler.last_label(), RoadType::Unknown);

        let session = telemetry.session().await;
        assert!(session.classified >= 1, "{session:?}");
        let phases: Vec<LifecyclePhase> = telemetry
            .snapshot_events()
            .await
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::Lifecycle(l) => Some(l.phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![LifecyclePhase::InferenceStarted, LifecyclePhase::InferenceStopped]
        );
    }

    #[test]
    fn state_toggles() {
        assert_eq!(SamplerState::Enabled.toggled(), SamplerState::Disabled);
        assert_eq!(SamplerState::Disabled.toggled(), SamplerState::Enabled);
    }
}
