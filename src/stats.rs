//! DTOs of the raw [RTCStatsReport] snapshots consumed by the network test.
//!
//! Only the subset of [WebRTC statistics][1] the quality assessment relies on
//! is modelled. Every other stats object is deserialized as
//! [`RtcStatsType::Other`] and ignored.
//!
//! [RTCStatsReport]: https://w3.org/TR/webrtc/#dom-rtcstatsreport
//! [1]: https://w3.org/TR/webrtc-stats

#![allow(clippy::module_name_repetitions)]

use std::str::FromStr;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Enum with which you can try to deserialize some known enum and if it
/// isn't known, then unknown data will be stored as [`String`] in the
/// [`NonExhaustive::Unknown`] variant.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NonExhaustive<T> {
    /// Will store known enum variant if it successfully deserialized.
    Known(T),

    /// Will store unknown enum variant with it's data as [`String`].
    Unknown(String),
}

/// Unique ID that is associated with the object that was inspected to produce
/// [`RtcStat`] object.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, From, Hash, PartialEq, Serialize,
)]
#[from(forward)]
pub struct StatId(pub String);

/// Timestamp in milliseconds, as [DOMHighResTimeStamp][1] is.
///
/// [1]: https://developer.mozilla.org/docs/Web/API/DOMHighResTimeStamp
#[derive(
    Clone, Copy, Debug, Default, Deserialize, From, PartialEq, PartialOrd,
    Serialize,
)]
pub struct HighResTimeStamp(pub f64);

impl HighResTimeStamp {
    /// Returns number of milliseconds elapsed since the `earlier` timestamp.
    ///
    /// Negative if `earlier` is actually later than this one.
    #[inline]
    #[must_use]
    pub fn millis_since(self, earlier: Self) -> f64 {
        self.0 - earlier.0
    }
}

/// Kind of a media carried by an [RTP] stream.
///
/// [RTP]: https://en.wikipedia.org/wiki/Real-time_Transport_Protocol
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio stream.
    #[display(fmt = "audio")]
    Audio,

    /// Video stream.
    #[display(fmt = "video")]
    Video,
}

/// Raw point-in-time snapshot of a publisher's transport statistics.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RtcStatsReport(pub Vec<RtcStat>);

impl RtcStatsReport {
    /// Returns all the outbound [RTP] streams of this [`RtcStatsReport`] in
    /// the order they were reported.
    ///
    /// [RTP]: https://en.wikipedia.org/wiki/Real-time_Transport_Protocol
    pub fn outbound_rtp(
        &self,
    ) -> impl Iterator<Item = (&RtcStat, &RtcOutboundRtpStreamStats)> {
        self.0.iter().filter_map(|stat| match &stat.stats {
            RtcStatsType::OutboundRtp(outbound) => Some((stat, &**outbound)),
            _ => None,
        })
    }

    /// Returns [`RtcRemoteInboundRtpStreamStats`] reported by the receiving
    /// side about the provided outbound stream.
    ///
    /// Reports referencing the outbound stream by its [`StatId`] take
    /// precedence over the ones matched by SSRC.
    #[must_use]
    pub fn remote_inbound_for(
        &self,
        outbound_id: &StatId,
        outbound: &RtcOutboundRtpStreamStats,
    ) -> Option<&RtcRemoteInboundRtpStreamStats> {
        let mut by_ssrc = None;
        for stat in &self.0 {
            if let RtcStatsType::RemoteInboundRtp(remote) = &stat.stats {
                if remote.local_id.as_ref() == Some(outbound_id) {
                    return Some(remote);
                }
                if by_ssrc.is_none()
                    && remote.ssrc == outbound.ssrc
                    && remote.kind == outbound.kind
                {
                    by_ssrc = Some(&**remote);
                }
            }
        }
        by_ssrc
    }

    /// Returns the nominated [ICE] candidate pair, if any.
    ///
    /// [ICE]: https://webrtcglossary.com/ice
    #[must_use]
    pub fn nominated_candidate_pair(
        &self,
    ) -> Option<&RtcIceCandidatePairStats> {
        self.0.iter().find_map(|stat| match &stat.stats {
            RtcStatsType::CandidatePair(pair) if pair.nominated => {
                Some(&**pair)
            }
            _ => None,
        })
    }

    /// Returns local [ICE] candidate with the provided [`StatId`].
    ///
    /// [ICE]: https://webrtcglossary.com/ice
    #[must_use]
    pub fn local_candidate(
        &self,
        id: &StatId,
    ) -> Option<&RtcIceCandidateStats> {
        self.0.iter().find_map(|stat| match &stat.stats {
            RtcStatsType::LocalCandidate(candidate) if &stat.id == id => {
                Some(&**candidate)
            }
            _ => None,
        })
    }

    /// Returns the most recent timestamp among all the [`RtcStat`]s of this
    /// [`RtcStatsReport`].
    #[must_use]
    pub fn latest_timestamp(&self) -> Option<HighResTimeStamp> {
        self.0
            .iter()
            .map(|stat| stat.timestamp)
            .fold(None, |latest, ts| match latest {
                Some(latest) if latest >= ts => Some(latest),
                _ => Some(ts),
            })
    }
}

impl FromStr for RtcStatsReport {
    type Err = serde_json::Error;

    /// Parses [`RtcStatsReport`] from a JSON array of stats objects, as
    /// produced by serializing [RTCStatsReport] values.
    ///
    /// [RTCStatsReport]: https://w3.org/TR/webrtc/#dom-rtcstatsreport
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Represents the [stats object] constructed by inspecting a specific
/// [monitored object].
///
/// [stats object]: https://w3.org/TR/webrtc-stats/#dfn-stats-object
/// [monitored object]: https://w3.org/TR/webrtc-stats/#dfn-monitored-object
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RtcStat {
    /// Unique ID of the inspected object.
    pub id: StatId,

    /// Timestamp associated with this object.
    pub timestamp: HighResTimeStamp,

    /// Actual stats of this [`RtcStat`].
    #[serde(flatten)]
    pub stats: RtcStatsType,
}

/// Types of [`RtcStat`]s the network test is interested in.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RtcStatsType {
    /// Statistics for an outbound [RTP] stream.
    ///
    /// With simulcast there is one such object per encoding, each with a
    /// distinct `ssrc`.
    ///
    /// [RTP]: https://en.wikipedia.org/wiki/Real-time_Transport_Protocol
    OutboundRtp(Box<RtcOutboundRtpStreamStats>),

    /// Statistics for an outbound [RTP] stream as reported by the receiving
    /// side in RTCP receiver reports.
    ///
    /// [RTP]: https://en.wikipedia.org/wiki/Real-time_Transport_Protocol
    RemoteInboundRtp(Box<RtcRemoteInboundRtpStreamStats>),

    /// [ICE] candidate pair statistics.
    ///
    /// [ICE]: https://webrtcglossary.com/ice
    CandidatePair(Box<RtcIceCandidatePairStats>),

    /// Local [ICE] candidate statistics.
    ///
    /// [ICE]: https://webrtcglossary.com/ice
    LocalCandidate(Box<RtcIceCandidateStats>),

    /// Any other stats object.
    #[serde(other)]
    Other,
}

/// [`RtcStatsType::OutboundRtp`] variant.
///
/// [Full doc on W3C][1].
///
/// [1]: https://w3.org/TR/webrtc-stats/#outboundrtpstats-dict%2A
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcOutboundRtpStreamStats {
    /// Synchronization source identifier of this stream.
    pub ssrc: u32,

    /// Kind of the media carried by this stream.
    #[serde(alias = "mediaType")]
    pub kind: MediaKind,

    /// Total number of bytes sent for this SSRC.
    #[serde(default)]
    pub bytes_sent: u64,

    /// Total number of RTP packets sent for this SSRC.
    #[serde(default)]
    pub packets_sent: u64,

    /// Width of the last encoded frame.
    pub frame_width: Option<u32>,

    /// Height of the last encoded frame.
    pub frame_height: Option<u32>,

    /// Number of encoded frames during the last second.
    pub frames_per_second: Option<f64>,

    /// Current reason for limiting the resolution and/or framerate.
    pub quality_limitation_reason:
        Option<NonExhaustive<QualityLimitationReason>>,

    /// Total number of Picture Loss Indication packets received.
    pub pli_count: Option<u64>,

    /// Total number of Negative ACKnowledgement packets received.
    pub nack_count: Option<u64>,

    /// Total number of packets that were retransmitted.
    pub retransmitted_packets_sent: Option<u64>,
}

/// Reason of an encoder limiting the resolution and/or framerate of a video
/// stream.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityLimitationReason {
    /// Resolution and/or framerate is not limited.
    #[display(fmt = "none")]
    None,

    /// Resolution and/or framerate is primarily limited due to CPU load.
    #[display(fmt = "cpu")]
    Cpu,

    /// Resolution and/or framerate is primarily limited due to congestion
    /// cues during bandwidth estimation.
    #[display(fmt = "bandwidth")]
    Bandwidth,

    /// Resolution and/or framerate is primarily limited for a reason other
    /// than the above.
    #[display(fmt = "other")]
    Other,
}

/// [`RtcStatsType::RemoteInboundRtp`] variant.
///
/// [Full doc on W3C][1].
///
/// [1]: https://w3.org/TR/webrtc-stats/#remoteinboundrtpstats-dict%2A
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcRemoteInboundRtpStreamStats {
    /// Synchronization source identifier of the reported stream.
    pub ssrc: u32,

    /// Kind of the media carried by the reported stream.
    #[serde(alias = "mediaType")]
    pub kind: MediaKind,

    /// [`StatId`] of the local outbound stream this report is about.
    pub local_id: Option<StatId>,

    /// Total number of packets of the stream lost, as reported by the
    /// receiver. May be negative because of duplicates.
    pub packets_lost: Option<i64>,

    /// Estimated round trip time in seconds.
    pub round_trip_time: Option<f64>,

    /// Fraction of packets lost since the previous receiver report.
    pub fraction_lost: Option<f64>,
}

/// [`RtcStatsType::CandidatePair`] variant.
///
/// [Full doc on W3C][1].
///
/// [1]: https://w3.org/TR/webrtc-stats/#candidatepair-dict%2A
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcIceCandidatePairStats {
    /// [`StatId`] of the local candidate of this pair.
    pub local_candidate_id: StatId,

    /// [`StatId`] of the remote candidate of this pair.
    pub remote_candidate_id: StatId,

    /// Indicates whether this pair was nominated by the ICE agent.
    #[serde(default)]
    pub nominated: bool,

    /// Latest round trip time measured in seconds.
    pub current_round_trip_time: Option<f64>,

    /// Available bitrate for all the outgoing RTP streams using this pair,
    /// in bits per second.
    pub available_outgoing_bitrate: Option<f64>,
}

/// [`RtcStatsType::LocalCandidate`] variant.
///
/// [Full doc on W3C][1].
///
/// [1]: https://w3.org/TR/webrtc-stats/#icecandidate-dict%2A
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcIceCandidateStats {
    /// Address of the candidate.
    pub address: Option<String>,

    /// Port number of the candidate.
    pub port: Option<u16>,

    /// Transport protocol used by the candidate.
    pub protocol: Option<NonExhaustive<TransportProtocol>>,
}

/// Transport protocol of an [ICE] candidate.
///
/// [ICE]: https://webrtcglossary.com/ice
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    /// User Datagram Protocol.
    #[display(fmt = "udp")]
    Udp,

    /// Transmission Control Protocol.
    #[display(fmt = "tcp")]
    Tcp,
}

/// Inbound statistics of a subscriber receiving the published test stream.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundStats {
    /// Received audio track statistics.
    pub audio: InboundTrackStats,

    /// Received video track statistics, if video is being received.
    pub video: Option<InboundTrackStats>,

    /// Time these statistics were gathered at.
    pub timestamp: HighResTimeStamp,
}

/// Inbound statistics of a single received track.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTrackStats {
    /// Total number of bytes received.
    pub bytes_received: u64,

    /// Total number of packets lost.
    pub packets_lost: u64,

    /// Total number of packets received.
    pub packets_received: u64,

    /// Number of decoded frames during the last second. Video only.
    pub frame_rate: Option<f64>,
}
