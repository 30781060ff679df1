//! [`QualityScorer`] turning a steady-state window into a [`QualityReport`].

use crate::{
    conf::Thresholds,
    metrics::{Resolution, SessionMetrics, TrackMetrics},
    quality::{mos, QualityReport, QualityScore, UnsupportedReason},
};

/// Video quality tier with the minimal bitrate it requires.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VideoTier {
    /// Resolution of this tier.
    pub resolution: Resolution,

    /// Frame rate of this tier.
    pub frame_rate: u32,

    /// Minimal bitrate in bits per second this tier requires.
    pub min_bitrate: u64,
}

impl VideoTier {
    const fn new(
        width: u32,
        height: u32,
        frame_rate: u32,
        min_bitrate: u64,
    ) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            frame_rate,
            min_bitrate,
        }
    }
}

/// All the [`VideoTier`]s in descending order.
pub const VIDEO_TIERS: [VideoTier; 8] = [
    VideoTier::new(1920, 1080, 30, 2_500_000),
    VideoTier::new(1920, 1080, 15, 1_500_000),
    VideoTier::new(1280, 720, 30, 1_000_000),
    VideoTier::new(1280, 720, 15, 600_000),
    VideoTier::new(640, 480, 30, 500_000),
    VideoTier::new(640, 480, 15, 300_000),
    VideoTier::new(320, 240, 30, 250_000),
    VideoTier::new(320, 240, 15, 150_000),
];

/// Returns the highest [`VideoTier`] not exceeding the `requested`
/// [`Resolution`] that the provided `bitrate` is enough for.
#[must_use]
pub fn recommend(bitrate: u64, requested: Resolution) -> Option<VideoTier> {
    VIDEO_TIERS
        .iter()
        .skip_while(|tier| tier.resolution.pixels() > requested.pixels())
        .find(|tier| bitrate >= tier.min_bitrate)
        .copied()
}

/// Deterministic calculator of [`QualityReport`]s.
///
/// Depends on nothing but the provided window, so scoring the same window
/// twice gives the same [`QualityReport`].
#[derive(Clone, Debug)]
pub struct QualityScorer {
    /// Thresholds the measured quality is compared against.
    thresholds: Thresholds,

    /// Video [`Resolution`] the test was requested with.
    requested_resolution: Resolution,

    /// Reason of video not being measured at all.
    video_unavailable: Option<UnsupportedReason>,
}

impl QualityScorer {
    /// Creates a new [`QualityScorer`] judging video against the
    /// `requested_resolution`.
    #[must_use]
    pub fn new(
        thresholds: Thresholds,
        requested_resolution: Resolution,
    ) -> Self {
        Self {
            thresholds,
            requested_resolution,
            video_unavailable: None,
        }
    }

    /// Makes this [`QualityScorer`] report video as unsupported with the
    /// provided `reason`, regardless of the window contents.
    #[must_use]
    pub fn without_video(mut self, reason: UnsupportedReason) -> Self {
        self.video_unavailable = Some(reason);
        self
    }

    /// Scores the provided `steady_state` window.
    ///
    /// Video isn't scored if `audio_only_fallback` is active, or if no entry
    /// of a non-empty window carries a video stream.
    #[must_use]
    pub fn score(
        &self,
        steady_state: &[&SessionMetrics],
        audio_only_fallback: bool,
    ) -> QualityReport {
        let video = if audio_only_fallback {
            QualityScore::unmeasured(UnsupportedReason::AudioOnlyFallback)
        } else if let Some(reason) = self.video_unavailable {
            QualityScore::unmeasured(reason)
        } else if !steady_state.is_empty()
            && steady_state.iter().all(|m| m.video.is_empty())
        {
            QualityScore::unmeasured(UnsupportedReason::NoVideoTrack)
        } else {
            self.score_video(steady_state)
        };
        QualityReport {
            audio: self.score_audio(steady_state),
            video,
        }
    }

    /// Scores audio of the provided window.
    fn score_audio(&self, window: &[&SessionMetrics]) -> QualityScore {
        let conf = &self.thresholds.audio;
        let mut throughput = Throughput::default();
        for metrics in window {
            if let Some(audio) = &metrics.audio {
                throughput.add(std::slice::from_ref(audio));
            }
        }
        let packet_loss_ratio = throughput.packet_loss_ratio();

        let (bitrate, mos) = match throughput.bitrate() {
            Some(bitrate) => (
                bitrate,
                mos::audio(
                    bitrate,
                    packet_loss_ratio,
                    mean_rtt_ms(window),
                    conf.min_bitrate,
                    conf.max_packet_loss_ratio,
                ),
            ),
            None => (0, mos::MIN_MOS),
        };
        let supported = mos >= conf.min_mos;

        QualityScore {
            bitrate: Some(bitrate),
            packet_loss_ratio: Some(packet_loss_ratio),
            mos: Some(mos),
            supported,
            reason: (!supported).then(|| UnsupportedReason::BandwidthLow),
            ..QualityScore::default()
        }
    }

    /// Scores video of the provided window.
    fn score_video(&self, window: &[&SessionMetrics]) -> QualityScore {
        let conf = &self.thresholds.video;
        let mut throughput = Throughput::default();
        for metrics in window {
            throughput.add(&metrics.video);
        }
        let packet_loss_ratio = throughput.packet_loss_ratio();

        let bitrate = throughput.bitrate();
        let mos = bitrate.map_or(mos::MIN_MOS, |bitrate| {
            mos::video(
                bitrate,
                packet_loss_ratio,
                self.requested_resolution.pixels(),
                conf.max_packet_loss_ratio,
            )
        });
        let bitrate = bitrate.unwrap_or_default();
        let tier = recommend(bitrate, self.requested_resolution);
        let supported = mos >= conf.min_mos && tier.is_some();

        let quality_limitation_reason = window
            .iter()
            .rev()
            .filter_map(|m| m.video.first())
            .find_map(|v| {
                v.video
                    .as_ref()
                    .and_then(|v| v.quality_limitation_reason.clone())
            });

        QualityScore {
            bitrate: Some(bitrate),
            packet_loss_ratio: Some(packet_loss_ratio),
            frame_rate: mean_frame_rate(window),
            mos: Some(mos),
            supported,
            reason: (!supported).then(|| UnsupportedReason::BandwidthLow),
            quality_limitation_reason,
            recommended_resolution: tier.map(|t| t.resolution),
            recommended_frame_rate: tier.map(|t| t.frame_rate),
        }
    }
}

/// Throughput and losses accumulated over a window.
#[derive(Debug, Default)]
struct Throughput {
    /// Bits sent during measured intervals.
    bits: f64,

    /// Total duration of measured intervals in milliseconds.
    interval_ms: f64,

    /// Packets sent.
    packets_sent: u64,

    /// Packets lost.
    packets_lost: u64,
}

impl Throughput {
    /// Accumulates the provided simultaneously sampled streams.
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, tracks: &[TrackMetrics]) {
        let mut interval_ms: f64 = 0.;
        for track in tracks {
            self.packets_sent += track.packets_sent_delta;
            self.packets_lost += track.packets_lost_delta;
            if track.has_interval() {
                self.bits += 8. * track.bytes_sent_delta as f64;
                interval_ms = interval_ms.max(track.interval_ms);
            }
        }
        self.interval_ms += interval_ms;
    }

    /// Returns average bitrate in bits per second, or `None` if no interval
    /// was measured.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bitrate(&self) -> Option<u64> {
        if self.interval_ms > 0. {
            Some((self.bits / (self.interval_ms / 1000.)).round() as u64)
        } else {
            None
        }
    }

    /// Returns ratio of lost packets to sent ones in `[0, 1]` range.
    #[allow(clippy::cast_precision_loss)]
    fn packet_loss_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.
        } else {
            (self.packets_lost as f64 / self.packets_sent as f64).min(1.)
        }
    }
}

/// Returns mean round trip time of the window in milliseconds, or `0` if it
/// was never measured.
#[allow(clippy::cast_precision_loss)]
fn mean_rtt_ms(window: &[&SessionMetrics]) -> f64 {
    let rtts: Vec<f64> = window
        .iter()
        .filter_map(|m| m.current_round_trip_time)
        .filter(|rtt| *rtt >= 0.)
        .collect();
    if rtts.is_empty() {
        0.
    } else {
        rtts.iter().sum::<f64>() / rtts.len() as f64 * 1000.
    }
}

/// Returns mean frame rate of the best video stream over the window.
#[allow(clippy::cast_precision_loss)]
fn mean_frame_rate(window: &[&SessionMetrics]) -> Option<f64> {
    let rates: Vec<f64> = window
        .iter()
        .filter_map(|m| {
            m.video
                .iter()
                .filter_map(|v| v.video.as_ref().and_then(|v| v.frame_rate))
                .fold(None, |max: Option<f64>, rate| {
                    Some(max.map_or(rate, |max| max.max(rate)))
                })
        })
        .collect();
    if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }
}
