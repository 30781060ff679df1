//! Quality test run loop settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Quality test run loop settings.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Quality {
    /// Interval between two consecutive publisher stats samples.
    /// Defaults to `1s`.
    #[default(Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,

    /// Maximum duration of a single stats retrieval. Retrieval exceeding it
    /// is treated as a failed sample. Defaults to `1s`.
    #[default(Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub stats_timeout: Duration,

    /// Trailing span of samples used for scoring. Defaults to `5s`.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub steady_state_window: Duration,

    /// Duration of an audio+video run. Defaults to `30s`.
    #[default(Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub audio_video_duration: Duration,

    /// Duration of an audio-only run. Defaults to `10s`.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub audio_only_duration: Duration,

    /// Hard ceiling of any run duration, regardless of mode and user
    /// provided timeout. Defaults to `30s`.
    #[default(Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    /// Minimum time since a run start before a stop request is honored.
    /// Earlier requests are queued. Defaults to `5s`.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub stop_grace_period: Duration,

    /// Number of failed samples per run after which the run is finalized
    /// early with the data collected so far. Defaults to `10`.
    #[default(10)]
    pub max_failed_samples: u32,

    /// Maximum time to wait for a single teardown acknowledgement
    /// (subscriber destroyed, publisher destroyed, session disconnected).
    /// Defaults to `5s`.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub teardown_timeout: Duration,
}

impl Quality {
    /// Returns duration of a run in the provided mode, limited by the
    /// optional user `timeout` and [`Quality::max_duration`].
    #[must_use]
    pub fn run_duration(
        &self,
        audio_only: bool,
        timeout: Option<Duration>,
    ) -> Duration {
        let mode_duration = if audio_only {
            self.audio_only_duration
        } else {
            self.audio_video_duration
        };
        timeout
            .map_or(mode_duration, |t| mode_duration.min(t))
            .min(self.max_duration)
    }
}
