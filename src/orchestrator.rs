//! [`QualityTest`] driving a [`MediaSession`] through a whole network test.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time;
use tracerr::Traced;

use crate::{
    callback::{Phase, UpdateCallbackStats},
    conf::{self, Conf, Thresholds},
    errors::{
        AcquisitionError, ConnectError, PublishError, QualityTestError,
        SubscribeError,
    },
    log::prelude::*,
    metrics::Resolution,
    quality::{QualityReport, QualityScorer, UnsupportedReason},
    run_loop::{QualityRunLoop, RunOutcome, RunSettings, StopSignal},
    session::{InputDeviceKind, MediaSession, PublisherSettings},
};

/// Options of a single [`QualityTest`].
#[derive(Clone, Debug, Default)]
pub struct QualityTestOptions {
    /// Publish audio only.
    pub audio_only: bool,

    /// Limits the run duration.
    pub timeout: Option<Duration>,

    /// Judge video against Full-HD instead of HD.
    pub full_hd: bool,

    /// Request simulcast for the published video.
    pub scalable_video: bool,

    /// ID of the microphone to test.
    pub audio_source: Option<String>,

    /// ID of the camera to test.
    pub video_source: Option<String>,
}

impl QualityTestOptions {
    /// Returns [`Resolution`] video is published and judged with.
    #[inline]
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        if self.full_hd {
            Resolution::FULL_HD
        } else {
            Resolution::HD
        }
    }
}

/// Handle requesting a running [`QualityTest`] to stop.
///
/// Stopping is safe at any time: before the test starts (the request is
/// queued), while it runs and after it's over (no-op).
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<StopSignal>);

impl StopHandle {
    /// Requests the [`QualityTest`] to stop, keeping everything measured so
    /// far.
    pub fn stop(&self) {
        if self.0.request() {
            info!("Network test stop requested");
        }
    }
}

/// Quality test of a [`MediaSession`].
pub struct QualityTest<M> {
    /// Session the test is run in.
    session: M,

    /// Run loop settings.
    conf: conf::Quality,

    /// Quality thresholds.
    thresholds: Thresholds,

    /// Options of this test.
    options: QualityTestOptions,

    /// Stop request of this test.
    stop: Arc<StopSignal>,

    /// Receiver of per-tick progress reports.
    on_update: Option<Box<dyn FnMut(UpdateCallbackStats)>>,
}

impl<M: MediaSession> QualityTest<M> {
    /// Creates a new [`QualityTest`] of the provided [`MediaSession`].
    #[must_use]
    pub fn new(session: M, conf: &Conf, options: QualityTestOptions) -> Self {
        Self {
            session,
            conf: conf.quality.clone(),
            thresholds: conf.thresholds.clone(),
            options,
            stop: Arc::new(StopSignal::default()),
            on_update: None,
        }
    }

    /// Sets receiver of per-tick progress reports.
    #[must_use]
    pub fn on_update<F>(mut self, on_update: F) -> Self
    where
        F: FnMut(UpdateCallbackStats) + 'static,
    {
        self.on_update = Some(Box::new(on_update));
        self
    }

    /// Returns [`StopHandle`] of this [`QualityTest`].
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Runs this [`QualityTest`].
    ///
    /// Runs audio+video test (unless audio-only is requested or there is no
    /// camera). If audio quality turns out to be insufficient, runs a second
    /// audio-only test and combines its audio verdict with the video verdict
    /// of the first one.
    ///
    /// Everything acquired is released before returning, whatever the
    /// outcome is.
    ///
    /// # Errors
    ///
    /// With [`QualityTestError`] if the environment is unsupported, local
    /// media can't be acquired or the session collaborator fails.
    pub async fn run(
        mut self,
    ) -> Result<QualityReport, Traced<QualityTestError>> {
        info!("Network test attempt");
        let result = self.execute().await;
        match &result {
            Ok(report) => info!(
                "Network test succeeded: audio supported: {}, video \
                 supported: {}",
                report.audio.supported, report.video.supported
            ),
            Err(e) => error!("Network test failed: {}", e),
        }
        result
    }

    /// Connects the session, measures quality and disconnects the session.
    async fn execute(
        &mut self,
    ) -> Result<QualityReport, Traced<QualityTestError>> {
        self.session
            .check_environment()
            .map_err(QualityTestError::UnsupportedEnvironment)
            .map_err(tracerr::wrap!())?;

        if self.session.is_connected() {
            debug!("Session is connected already");
        } else {
            debug!("Connecting session");
            self.session
                .connect()
                .await
                .map_err(|e| QualityTestError::from(ConnectError::from(e)))
                .map_err(tracerr::wrap!())?;
        }

        let result = self.measure().await;
        self.release("session", self.session.disconnect()).await;
        result
    }

    /// Validates devices and runs the test, with the audio-only fallback if
    /// needed.
    async fn measure(
        &mut self,
    ) -> Result<QualityReport, Traced<QualityTestError>> {
        let has_camera = self.validate_devices().await?;
        let audio_only = self.options.audio_only || !has_camera;

        let mut scorer = QualityScorer::new(
            self.thresholds.clone(),
            self.options.resolution(),
        );
        if self.options.audio_only {
            scorer =
                scorer.without_video(UnsupportedReason::AudioOnlyRequested);
        } else if !has_camera {
            info!("No camera found, running audio-only test");
            scorer = scorer.without_video(UnsupportedReason::NoCamera);
        }

        let phase = if audio_only {
            Phase::AudioOnly
        } else {
            Phase::AudioVideo
        };
        let first = self.run_once(&scorer, phase, false).await?;
        if !first.fallback_required {
            return Ok(first.report);
        }
        if self.stop.is_requested() {
            debug!("Stop requested, skipping audio-only fallback");
            return Ok(first.report);
        }

        info!(
            "Audio quality is insufficient, falling back to audio-only test"
        );
        let second = self.run_once(&scorer, Phase::AudioOnly, true).await?;
        Ok(QualityReport {
            audio: second.report.audio,
            video: first.report.video,
        })
    }

    /// Checks that local media can be acquired.
    ///
    /// Returns whether there is a camera to test.
    async fn validate_devices(
        &self,
    ) -> Result<bool, Traced<QualityTestError>> {
        use AcquisitionError as E;

        let devices = self.session.devices().await.map_err(|e| {
            debug!("Failed to enumerate devices: {}", e);
            tracerr::new!(QualityTestError::from(
                E::FailedToObtainMediaDevices
            ))
        })?;
        if !devices.iter().any(|d| d.kind == InputDeviceKind::AudioInput) {
            return Err(tracerr::new!(QualityTestError::from(
                E::NoAudioCaptureDevices
            )));
        }
        let has_camera =
            devices.iter().any(|d| d.kind == InputDeviceKind::VideoInput);

        if self.options.full_hd && has_camera && !self.options.audio_only {
            self.session
                .check_camera_resolution(
                    self.options.video_source.as_deref(),
                    Resolution::FULL_HD,
                )
                .await
                .map_err(|e| {
                    debug!("Camera resolution check failed: {}", e);
                    tracerr::new!(QualityTestError::from(
                        E::from_resolution_check(&e)
                    ))
                })?;
        }
        Ok(has_camera)
    }

    /// Publishes and subscribes to a test stream, measures its quality and
    /// releases both.
    async fn run_once(
        &mut self,
        scorer: &QualityScorer,
        phase: Phase,
        audio_only_fallback: bool,
    ) -> Result<RunOutcome, Traced<QualityTestError>> {
        let publish_video = phase == Phase::AudioVideo;
        let settings = PublisherSettings {
            audio_source: self.options.audio_source.clone(),
            publish_video,
            video_source: self
                .options
                .video_source
                .clone()
                .filter(|_| publish_video),
            resolution: self.options.resolution(),
            scalable_video: self.options.scalable_video,
        };

        debug!("Publishing {} test stream", phase);
        let publisher = self
            .session
            .publish(settings)
            .await
            .map_err(|e| QualityTestError::from(PublishError::from(e)))
            .map_err(tracerr::wrap!())?;

        debug!("Subscribing to {} test stream", phase);
        let subscriber = match self.session.subscribe(&publisher).await {
            Ok(Some(subscriber)) => subscriber,
            Ok(None) => {
                self.release("publisher", self.session.unpublish(publisher))
                    .await;
                return Err(tracerr::new!(
                    QualityTestError::MissingSubscriber
                ));
            }
            Err(e) => {
                self.release("publisher", self.session.unpublish(publisher))
                    .await;
                return Err(tracerr::new!(QualityTestError::from(
                    SubscribeError::from(e)
                )));
            }
        };

        let settings = RunSettings {
            phase,
            audio_only_fallback,
            duration: self.conf.run_duration(
                phase == Phase::AudioOnly,
                self.options.timeout,
            ),
        };
        let mut run_loop = QualityRunLoop::new(
            &publisher,
            &subscriber,
            scorer,
            &self.conf,
            settings,
            &self.stop,
        );
        if let Some(on_update) = self.on_update.as_deref_mut() {
            run_loop = run_loop.on_update(on_update);
        }
        let outcome = run_loop.run().await;

        self.release("subscriber", self.session.unsubscribe(subscriber))
            .await;
        self.release("publisher", self.session.unpublish(publisher))
            .await;
        Ok(outcome)
    }

    /// Awaits acknowledgement of the resource release, giving up after
    /// [`conf::Quality::teardown_timeout`].
    async fn release<F>(&self, resource: &str, release: F)
    where
        F: Future<Output = ()>,
    {
        debug!("Releasing {}", resource);
        let timeout = self.conf.teardown_timeout;
        if time::timeout(timeout, release).await.is_err() {
            warn!(
                "Release of {} wasn't acknowledged in {:?}",
                resource, timeout
            );
        }
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn resolution_follows_full_hd_option() {
        let mut options = QualityTestOptions::default();
        assert_eq!(options.resolution(), Resolution::HD);

        options.full_hd = true;
        assert_eq!(options.resolution(), Resolution::FULL_HD);
    }

    #[test]
    fn stop_handles_share_single_request() {
        let signal = Arc::new(StopSignal::default());
        let first = StopHandle(Arc::clone(&signal));
        let second = first.clone();

        first.stop();
        second.stop();
        first.stop();

        assert!(signal.is_requested());
    }
}
