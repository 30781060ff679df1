//! Quality verdicts of a network test.

pub mod mos;
pub mod scorer;

use derive_more::Display;
use serde::{Serialize, Serializer};

use crate::{
    metrics::Resolution,
    stats::{NonExhaustive, QualityLimitationReason},
};

#[doc(inline)]
pub use self::scorer::{QualityScorer, VideoTier, VIDEO_TIERS};

/// Reason of a media kind being considered unsupported.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum UnsupportedReason {
    /// Measured quality is below the thresholds.
    #[display(fmt = "Bandwidth too low.")]
    BandwidthLow,

    /// There is no camera to publish video from.
    #[display(fmt = "No camera was found.")]
    NoCamera,

    /// No video stream was sent during the measured period.
    #[display(fmt = "No video track was published.")]
    NoVideoTrack,

    /// Video wasn't measured because the test fell back to audio-only.
    #[display(fmt = "Bandwidth too low. Audio-only fallback was used.")]
    AudioOnlyFallback,

    /// Video wasn't measured because an audio-only test was requested.
    #[display(fmt = "Audio-only test was requested.")]
    AudioOnlyRequested,
}

impl Serialize for UnsupportedReason {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Quality verdict of a single media kind.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScore {
    /// Average bitrate in bits per second.
    pub bitrate: Option<u64>,

    /// Ratio of lost packets to sent ones.
    pub packet_loss_ratio: Option<f64>,

    /// Average frame rate. Video only.
    pub frame_rate: Option<f64>,

    /// Estimated Mean Opinion Score in `[1.0, 4.5]` range.
    pub mos: Option<f64>,

    /// Indicates whether quality is acceptable.
    pub supported: bool,

    /// Reason of quality being unacceptable.
    pub reason: Option<UnsupportedReason>,

    /// Reason of the encoder limiting video quality. Video only.
    pub quality_limitation_reason:
        Option<NonExhaustive<QualityLimitationReason>>,

    /// Highest resolution the measured bandwidth is enough for. Video only.
    pub recommended_resolution: Option<Resolution>,

    /// Highest frame rate the measured bandwidth is enough for at
    /// [`QualityScore::recommended_resolution`]. Video only.
    pub recommended_frame_rate: Option<u32>,
}

impl QualityScore {
    /// Returns [`QualityScore`] of a media kind that wasn't measured at all.
    #[must_use]
    pub fn unmeasured(reason: UnsupportedReason) -> Self {
        Self {
            supported: false,
            reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Quality verdicts of both media kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QualityReport {
    /// Audio verdict.
    pub audio: QualityScore,

    /// Video verdict.
    pub video: QualityScore,
}
