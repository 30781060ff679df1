//! Progress reports delivered to a network test caller on every tick.

use derive_more::Display;
use serde::Serialize;

use crate::{
    metrics::SessionMetrics,
    stats::{HighResTimeStamp, InboundStats},
};

/// Phase of a network test.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Audio and video are published.
    #[display(fmt = "audio-video")]
    AudioVideo,

    /// Only audio is published.
    #[display(fmt = "audio-only")]
    AudioOnly,
}

/// Send and receive counters of a single media kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackTrackStats {
    /// Total number of bytes sent.
    pub bytes_sent: u64,

    /// Total number of bytes received.
    pub bytes_received: u64,

    /// Total number of packets lost.
    pub packets_lost: u64,

    /// Total number of packets received.
    pub packets_received: u64,
}

/// [`CallbackTrackStats`] of a video.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackVideoStats {
    /// Send and receive counters.
    #[serde(flatten)]
    pub track: CallbackTrackStats,

    /// Received frames per second.
    pub frame_rate: f64,
}

/// Snapshot of a single network test tick.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCallbackStats {
    /// Phase the tick belongs to.
    pub phase: Phase,

    /// Audio counters.
    pub audio: CallbackTrackStats,

    /// Video counters. Present in [`Phase::AudioVideo`] only.
    pub video: Option<CallbackVideoStats>,

    /// Time the inbound stats were gathered at.
    pub timestamp: HighResTimeStamp,
}

impl UpdateCallbackStats {
    /// Combines outbound [`SessionMetrics`] and [`InboundStats`] of the same
    /// tick.
    #[must_use]
    pub fn new(
        phase: Phase,
        outbound: &SessionMetrics,
        inbound: &InboundStats,
    ) -> Self {
        let audio = CallbackTrackStats {
            bytes_sent: outbound.audio.as_ref().map_or(0, |a| a.bytes_sent),
            bytes_received: inbound.audio.bytes_received,
            packets_lost: inbound.audio.packets_lost,
            packets_received: inbound.audio.packets_received,
        };
        let video = (phase == Phase::AudioVideo).then(|| {
            let received = inbound.video.clone().unwrap_or_default();
            CallbackVideoStats {
                track: CallbackTrackStats {
                    bytes_sent: outbound.video_bytes_sent(),
                    bytes_received: received.bytes_received,
                    packets_lost: received.packets_lost,
                    packets_received: received.packets_received,
                },
                frame_rate: received.frame_rate.unwrap_or_default(),
            }
        });
        Self {
            phase,
            audio,
            video,
            timestamp: inbound.timestamp,
        }
    }
}
