//! Normalized per-tick metrics derived from raw [`RtcStatsReport`]s.
//!
//! [`RtcStatsReport`]: crate::stats::RtcStatsReport

pub mod sampler;
pub mod window;

use derive_more::Display;
use serde::{Serialize, Serializer};

use crate::stats::{
    HighResTimeStamp, MediaKind, NonExhaustive, QualityLimitationReason,
    TransportProtocol,
};

#[doc(inline)]
pub use self::{sampler::sample, window::SampleWindow};

/// Dimensions of a video frame.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display(fmt = "{}x{}", width, height)]
pub struct Resolution {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,
}

impl Resolution {
    /// HD resolution (1280x720).
    pub const HD: Self = Self::new(1280, 720);

    /// Full-HD resolution (1920x1080).
    pub const FULL_HD: Self = Self::new(1920, 1080);

    /// Creates a new [`Resolution`].
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns total number of pixels in a frame of this [`Resolution`].
    #[inline]
    #[must_use]
    pub const fn pixels(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Serialize for Resolution {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Metrics of a single outbound stream measured during one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackMetrics {
    /// Kind of the media carried by the stream.
    pub kind: MediaKind,

    /// Transport identifier (SSRC) of the stream.
    pub stream_id: u32,

    /// Total number of bytes sent so far.
    pub bytes_sent: u64,

    /// Bytes sent since the previous tick. `0` for a first sample.
    pub bytes_sent_delta: u64,

    /// Total number of packets sent so far.
    pub packets_sent: u64,

    /// Packets sent since the previous tick. `0` for a first sample.
    pub packets_sent_delta: u64,

    /// Total number of packets reported lost by the receiving side.
    pub packets_lost: u64,

    /// Packets reported lost since the previous tick. `0` for a first
    /// sample.
    pub packets_lost_delta: u64,

    /// Time this stream was inspected at.
    pub timestamp: HighResTimeStamp,

    /// Milliseconds elapsed since the previous sample of this stream.
    ///
    /// `0` for a first sample or a non-increasing timestamp, so such samples
    /// never contribute to throughput averages.
    pub interval_ms: f64,

    /// Derived bitrate in bits per second.
    pub bitrate: u64,

    /// Video specific metrics. `None` for audio streams.
    pub video: Option<VideoTrackMetrics>,
}

impl TrackMetrics {
    /// Indicates whether this sample measures a positive time interval.
    #[inline]
    #[must_use]
    pub fn has_interval(&self) -> bool {
        self.interval_ms > 0.
    }
}

/// Video specific metrics of an outbound stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoTrackMetrics {
    /// Resolution of the last encoded frame, if known.
    pub resolution: Option<Resolution>,

    /// Encoded frames per second.
    pub frame_rate: Option<f64>,

    /// Reason of the encoder limiting resolution and/or frame rate.
    pub quality_limitation_reason:
        Option<NonExhaustive<QualityLimitationReason>>,

    /// Total number of Picture Loss Indications received.
    pub pli_count: u64,

    /// Total number of Negative ACKnowledgements received.
    pub nack_count: u64,

    /// Total number of retransmitted packets.
    pub retransmitted_packets_sent: u64,
}

/// Metrics of the whole publishing session measured during one tick.
///
/// Immutable once appended to a [`SampleWindow`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionMetrics {
    /// Metrics of the published audio stream, if any.
    pub audio: Option<TrackMetrics>,

    /// Metrics of the published video streams. More than one with simulcast.
    pub video: Vec<TrackMetrics>,

    /// Available outgoing bitrate of the nominated candidate pair, in bits
    /// per second. `None` if no pair is nominated.
    pub available_outgoing_bitrate: Option<f64>,

    /// Current round trip time of the nominated candidate pair, in seconds.
    /// `None` if no pair is nominated.
    pub current_round_trip_time: Option<f64>,

    /// Transport protocol of the nominated local candidate.
    pub transport_protocol: Option<NonExhaustive<TransportProtocol>>,

    /// Indicates whether more than one video stream is being sent.
    pub simulcast_enabled: bool,

    /// Time of this tick (the most recent stats timestamp).
    pub timestamp: HighResTimeStamp,
}

impl SessionMetrics {
    /// Returns total number of video bytes sent across all the simulcast
    /// streams.
    #[must_use]
    pub fn video_bytes_sent(&self) -> u64 {
        self.video.iter().map(|v| v.bytes_sent).sum()
    }

    /// Returns total video bitrate across all the simulcast streams.
    #[must_use]
    pub fn video_bitrate(&self) -> u64 {
        self.video.iter().map(|v| v.bitrate).sum()
    }

    /// Returns transport protocol name, or `N/A` if it's unknown.
    #[must_use]
    pub fn transport_protocol_name(&self) -> String {
        match &self.transport_protocol {
            Some(NonExhaustive::Known(proto)) => proto.to_string(),
            Some(NonExhaustive::Unknown(proto)) => proto.clone(),
            None => "N/A".to_owned(),
        }
    }
}
