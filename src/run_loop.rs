//! Single time-bounded and cancellable quality measurement run.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use derive_more::Display;
use tokio::{
    sync::Notify,
    time::{self, Instant},
};

use crate::{
    callback::{Phase, UpdateCallbackStats},
    conf,
    log::prelude::*,
    metrics::{sampler, SampleWindow, SessionMetrics},
    quality::{QualityReport, QualityScorer},
    session::{Publisher, Subscriber},
};

/// Shortest interval between two ticks of a [`QualityRunLoop`].
const MIN_STATS_INTERVAL: Duration = Duration::from_millis(1);

/// Stop request shared between a network test and its caller.
///
/// Requesting a stop more than once has no additional effect.
#[derive(Debug, Default)]
pub struct StopSignal {
    /// Indicator whether a stop was requested.
    requested: AtomicBool,

    /// Wakes a run waiting for the stop request.
    notify: Notify,
}

impl StopSignal {
    /// Requests a stop. Returns `false` if it was already requested.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_one();
        }
        first
    }

    /// Indicates whether a stop was requested.
    #[inline]
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once a stop is requested.
    pub async fn requested(&self) {
        while !self.is_requested() {
            self.notify.notified().await;
        }
    }
}

/// State of a [`QualityRunLoop`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum RunState {
    /// Run hasn't started yet.
    Idle,

    /// Stats are being sampled on every tick.
    Sampling,

    /// Audio quality is insufficient, so an audio-only run should follow.
    EvaluatingFallback,

    /// Final [`QualityReport`] is being built.
    Finalizing,

    /// Run is over.
    Done,
}

/// Event finishing a [`QualityRunLoop`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum RunEnd {
    /// Run duration elapsed.
    #[display(fmt = "timeout")]
    Timeout,

    /// Stop was requested.
    #[display(fmt = "stop request")]
    Stopped,

    /// Too many ticks failed to provide stats.
    #[display(fmt = "too many failed samples")]
    SamplingFailed,
}

/// Result of a single [`QualityRunLoop`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    /// [`QualityReport`] of the final steady-state window.
    pub report: QualityReport,

    /// Event finished the run.
    pub ended_by: RunEnd,

    /// Indicates whether an audio-only run should follow.
    pub fallback_required: bool,

    /// Number of ticks that provided stats.
    pub samples: usize,

    /// Number of ticks that failed to provide stats.
    pub failed_samples: u32,
}

/// Settings of a single [`QualityRunLoop`].
#[derive(Clone, Copy, Debug)]
pub struct RunSettings {
    /// Phase of the run.
    pub phase: Phase,

    /// Indicates whether this run is an audio-only fallback of a failed
    /// audio+video run.
    pub audio_only_fallback: bool,

    /// Duration after which the run is finalized.
    pub duration: Duration,
}

/// Events a [`QualityRunLoop`] reacts to.
enum RunEvent {
    /// Stats should be sampled.
    Tick,

    /// Run duration elapsed.
    Timeout,

    /// Stop was requested and the grace period is over.
    Stop,
}

/// Measures quality of the borrowed [`Publisher`] and [`Subscriber`] pair
/// until timeout, stop request or too many sampling failures.
pub struct QualityRunLoop<'a, P: ?Sized, S: ?Sized> {
    /// Source of outbound stats.
    publisher: &'a P,

    /// Source of inbound stats.
    subscriber: &'a S,

    /// Scorer of the collected window.
    scorer: &'a QualityScorer,

    /// Run loop timings.
    conf: &'a conf::Quality,

    /// Settings of this run.
    settings: RunSettings,

    /// Stop request of the whole test.
    stop: &'a StopSignal,

    /// Receiver of per-tick progress reports.
    on_update: Option<&'a mut dyn FnMut(UpdateCallbackStats)>,

    /// Current [`RunState`].
    state: RunState,

    /// Stats collected so far.
    window: SampleWindow,

    /// Number of ticks failed to provide stats.
    failed_samples: u32,
}

impl<'a, P, S> QualityRunLoop<'a, P, S>
where
    P: Publisher + ?Sized,
    S: Subscriber + ?Sized,
{
    /// Creates a new [`QualityRunLoop`] in [`RunState::Idle`].
    #[must_use]
    pub fn new(
        publisher: &'a P,
        subscriber: &'a S,
        scorer: &'a QualityScorer,
        conf: &'a conf::Quality,
        settings: RunSettings,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            publisher,
            subscriber,
            scorer,
            conf,
            settings,
            stop,
            on_update: None,
            state: RunState::Idle,
            window: SampleWindow::new(conf.steady_state_window),
            failed_samples: 0,
        }
    }

    /// Sets receiver of per-tick progress reports.
    #[must_use]
    pub fn on_update(
        mut self,
        on_update: &'a mut dyn FnMut(UpdateCallbackStats),
    ) -> Self {
        self.on_update = Some(on_update);
        self
    }

    /// Runs this [`QualityRunLoop`] to completion.
    ///
    /// Stop requested earlier than [`conf::Quality::stop_grace_period`]
    /// since the run start is postponed until the grace period passes. Stop
    /// is never honored in the middle of a tick.
    pub async fn run(mut self) -> RunOutcome {
        self.set_state(RunState::Sampling);

        let period = self.conf.stats_interval.max(MIN_STATS_INTERVAL);
        let start = Instant::now();
        let grace_deadline = start + self.conf.stop_grace_period;
        let signal = self.stop;

        let mut ticks = time::interval_at(start + period, period);
        let deadline = time::sleep_until(start + self.settings.duration);
        let stop = async move {
            signal.requested().await;
            time::sleep_until(grace_deadline).await;
        };
        tokio::pin!(deadline);
        tokio::pin!(stop);

        let ended_by = loop {
            let event: RunEvent = tokio::select! {
                biased;
                _ = &mut deadline => RunEvent::Timeout,
                _ = &mut stop => RunEvent::Stop,
                _ = ticks.tick() => RunEvent::Tick,
            };
            match event {
                RunEvent::Timeout => break RunEnd::Timeout,
                RunEvent::Stop => break RunEnd::Stopped,
                RunEvent::Tick => {
                    if self.stop.is_requested()
                        && Instant::now() >= grace_deadline
                    {
                        break RunEnd::Stopped;
                    }
                    if !self.tick().await {
                        break RunEnd::SamplingFailed;
                    }
                }
            }
        };
        debug!("{} run finished by {}", self.settings.phase, ended_by);

        self.finalize(ended_by)
    }

    /// Samples stats once, appending them to the window.
    ///
    /// Returns `false` if the failed samples ceiling is exceeded.
    async fn tick(&mut self) -> bool {
        let sampled = time::timeout(
            self.conf.stats_timeout,
            sampler::sample(self.publisher, self.window.last()),
        )
        .await;

        match sampled {
            Ok(Some(metrics)) => {
                self.report_progress(&metrics).await;
                self.window.push(metrics);
                let score =
                    self.scorer.score(&self.window.steady_state(), false);
                trace!(
                    "Running score: audio MOS {:?}, video MOS {:?}",
                    score.audio.mos,
                    score.video.mos
                );
            }
            Ok(None) | Err(_) => {
                self.failed_samples += 1;
                debug!(
                    "No stats sampled on this tick ({} failed so far)",
                    self.failed_samples
                );
                if self.failed_samples > self.conf.max_failed_samples {
                    return false;
                }
            }
        }
        true
    }

    /// Passes progress of the current tick to the registered receiver.
    ///
    /// Tick is not reported if inbound stats can't be retrieved.
    async fn report_progress(&mut self, metrics: &SessionMetrics) {
        if self.on_update.is_none() {
            return;
        }
        let inbound = time::timeout(
            self.conf.stats_timeout,
            self.subscriber.inbound_stats(),
        )
        .await;
        let inbound = match inbound {
            Ok(Ok(inbound)) => inbound,
            Ok(Err(e)) => {
                debug!("Failed to get subscriber stats: {}", e);
                return;
            }
            Err(_) => {
                debug!("Subscriber stats retrieval timed out");
                return;
            }
        };
        let stats =
            UpdateCallbackStats::new(self.settings.phase, metrics, &inbound);
        if let Some(on_update) = self.on_update.as_mut() {
            on_update(stats);
        }
    }

    /// Scores the final steady-state window and decides whether an
    /// audio-only run should follow.
    fn finalize(mut self, ended_by: RunEnd) -> RunOutcome {
        let report = self.scorer.score(
            &self.window.steady_state(),
            self.settings.audio_only_fallback,
        );
        let fallback_required = self.settings.phase == Phase::AudioVideo
            && ended_by != RunEnd::Stopped
            && !report.audio.supported;

        if fallback_required {
            self.set_state(RunState::EvaluatingFallback);
        }
        self.set_state(RunState::Finalizing);
        let outcome = RunOutcome {
            report,
            ended_by,
            fallback_required,
            samples: self.window.len(),
            failed_samples: self.failed_samples,
        };
        self.set_state(RunState::Done);
        outcome
    }

    /// Switches this [`QualityRunLoop`] to the provided [`RunState`].
    fn set_state(&mut self, state: RunState) {
        trace!("Run state: {} -> {}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod spec {
    use std::cell::{Cell, RefCell};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::{
        conf::Thresholds,
        metrics::Resolution,
        quality::UnsupportedReason,
        session::{SessionError, SessionErrorKind},
        stats::{HighResTimeStamp, InboundStats, RtcStatsReport},
    };

    use super::*;

    /// [`Publisher`] sending audio and video with the constant bitrates,
    /// reporting one second of stats per call.
    struct FakePublisher {
        calls: Cell<u64>,
        audio_bytes_per_sec: u64,
        video_bytes_per_sec: u64,
        stats_delay: Option<Duration>,
        fail: bool,
    }

    impl FakePublisher {
        fn new(audio_bytes_per_sec: u64, video_bytes_per_sec: u64) -> Self {
            Self {
                calls: Cell::new(0),
                audio_bytes_per_sec,
                video_bytes_per_sec,
                stats_delay: None,
                fail: false,
            }
        }
    }

    #[async_trait(?Send)]
    impl Publisher for FakePublisher {
        async fn outbound_stats(&self) -> Result<RtcStatsReport, SessionError> {
            if let Some(delay) = self.stats_delay {
                time::sleep(delay).await;
            }
            if self.fail {
                return Err(SessionError::new(SessionErrorKind::Other, "fail"));
            }
            let n = self.calls.get() + 1;
            self.calls.set(n);
            #[allow(clippy::cast_precision_loss)]
            let ts = n as f64 * 1000.;
            Ok(serde_json::from_value(json!([
                {
                    "id": "audio",
                    "timestamp": ts,
                    "type": "outbound-rtp",
                    "ssrc": 1,
                    "kind": "audio",
                    "bytesSent": n * self.audio_bytes_per_sec,
                    "packetsSent": n * 50,
                },
                {
                    "id": "video",
                    "timestamp": ts,
                    "type": "outbound-rtp",
                    "ssrc": 2,
                    "kind": "video",
                    "bytesSent": n * self.video_bytes_per_sec,
                    "packetsSent": n * 100,
                },
            ]))
            .unwrap())
        }
    }

    struct FakeSubscriber;

    #[async_trait(?Send)]
    impl Subscriber for FakeSubscriber {
        async fn inbound_stats(&self) -> Result<InboundStats, SessionError> {
            Ok(InboundStats {
                timestamp: HighResTimeStamp(1.),
                ..InboundStats::default()
            })
        }
    }

    fn conf() -> conf::Quality {
        conf::Quality::default()
    }

    fn scorer() -> QualityScorer {
        QualityScorer::new(Thresholds::default(), Resolution::HD)
    }

    fn settings(phase: Phase, duration: u64) -> RunSettings {
        RunSettings {
            phase,
            audio_only_fallback: false,
            duration: Duration::from_secs(duration),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_by_timeout() {
        let (conf, scorer, stop) = (conf(), scorer(), StopSignal::default());
        let publisher = FakePublisher::new(5000, 125_000);

        let start = Instant::now();
        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 10),
            &stop,
        )
        .run()
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(outcome.ended_by, RunEnd::Timeout);
        assert_eq!(outcome.samples, 9);
        assert_eq!(outcome.failed_samples, 0);
        assert!(!outcome.fallback_required);
        assert!(outcome.report.audio.supported);
        assert_eq!(outcome.report.audio.bitrate, Some(40_000));
        assert!(outcome.report.video.supported);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_stats_interval_is_clamped() {
        let conf = conf::Quality {
            stats_interval: Duration::from_secs(0),
            ..conf()
        };
        let (scorer, stop) = (scorer(), StopSignal::default());
        let publisher = FakePublisher::new(5000, 125_000);

        let start = Instant::now();
        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 1),
            &stop,
        )
        .run()
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(outcome.ended_by, RunEnd::Timeout);
        assert_eq!(outcome.samples, 999);
    }

    #[tokio::test(start_paused = true)]
    async fn requires_fallback_when_audio_is_poor() {
        let (conf, scorer, stop) = (conf(), scorer(), StopSignal::default());
        let publisher = FakePublisher::new(0, 125_000);

        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 10),
            &stop,
        )
        .run()
        .await;

        assert!(!outcome.report.audio.supported);
        assert!(outcome.fallback_required);

        let publisher = FakePublisher::new(0, 0);
        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            RunSettings {
                audio_only_fallback: true,
                ..settings(Phase::AudioOnly, 10)
            },
            &stop,
        )
        .run()
        .await;

        assert!(!outcome.report.audio.supported);
        assert!(!outcome.fallback_required);
        assert_eq!(
            outcome.report.video.reason,
            Some(UnsupportedReason::AudioOnlyFallback),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queues_early_stop_until_grace_period() {
        let (conf, scorer, stop) = (conf(), scorer(), StopSignal::default());
        let publisher = FakePublisher::new(0, 0);
        assert!(stop.request());
        assert!(!stop.request());

        let start = Instant::now();
        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 30),
            &stop,
        )
        .run()
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(outcome.ended_by, RunEnd::Stopped);
        assert_eq!(outcome.samples, 4);
        assert!(!outcome.report.audio.supported);
        assert!(!outcome.fallback_required);
    }

    #[tokio::test(start_paused = true)]
    async fn honors_stop_after_grace_period_immediately() {
        let (conf, scorer, stop) = (conf(), scorer(), StopSignal::default());
        let publisher = FakePublisher::new(5000, 125_000);

        let start = Instant::now();
        let (outcome, _) = tokio::join!(
            QualityRunLoop::new(
                &publisher,
                &FakeSubscriber,
                &scorer,
                &conf,
                settings(Phase::AudioVideo, 30),
                &stop,
            )
            .run(),
            async {
                time::sleep(Duration::from_millis(7500)).await;
                stop.request();
            },
        );

        assert_eq!(start.elapsed(), Duration::from_millis(7500));
        assert_eq!(outcome.ended_by, RunEnd::Stopped);
        assert_eq!(outcome.samples, 7);
        assert!(outcome.report.audio.supported);
    }

    #[tokio::test(start_paused = true)]
    async fn finalizes_early_after_too_many_failed_samples() {
        let conf = conf::Quality {
            max_failed_samples: 3,
            ..conf()
        };
        let (scorer, stop) = (scorer(), StopSignal::default());
        let publisher = FakePublisher {
            fail: true,
            ..FakePublisher::new(5000, 125_000)
        };

        let start = Instant::now();
        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 30),
            &stop,
        )
        .run()
        .await;

        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(outcome.ended_by, RunEnd::SamplingFailed);
        assert_eq!(outcome.samples, 0);
        assert_eq!(outcome.failed_samples, 4);
        assert_eq!(outcome.report.audio.mos, Some(1.0));
        assert!(!outcome.report.audio.supported);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stats_retrieval_is_a_failed_sample() {
        let conf = conf::Quality {
            max_failed_samples: 2,
            ..conf()
        };
        let (scorer, stop) = (scorer(), StopSignal::default());
        let publisher = FakePublisher {
            stats_delay: Some(Duration::from_secs(2)),
            ..FakePublisher::new(5000, 125_000)
        };

        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioVideo, 30),
            &stop,
        )
        .run()
        .await;

        assert_eq!(outcome.ended_by, RunEnd::SamplingFailed);
        assert_eq!(outcome.samples, 0);
        assert_eq!(outcome.failed_samples, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_progress_once_per_sampled_tick() {
        let (conf, scorer, stop) = (conf(), scorer(), StopSignal::default());
        let publisher = FakePublisher::new(5000, 125_000);
        let updates = RefCell::new(Vec::new());
        let mut on_update = |stats: UpdateCallbackStats| {
            updates.borrow_mut().push(stats);
        };

        let outcome = QualityRunLoop::new(
            &publisher,
            &FakeSubscriber,
            &scorer,
            &conf,
            settings(Phase::AudioOnly, 6),
            &stop,
        )
        .on_update(&mut on_update)
        .run()
        .await;

        let updates = updates.into_inner();
        assert_eq!(updates.len(), outcome.samples);
        assert_eq!(updates.len(), 5);
        assert!(updates.iter().all(|u| u.phase == Phase::AudioOnly));
        assert!(updates.iter().all(|u| u.video.is_none()));
        assert_eq!(updates[4].audio.bytes_sent, 25_000);
    }
}
