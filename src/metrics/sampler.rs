//! Sampling of publisher statistics into [`SessionMetrics`].

use crate::{
    log::prelude::*,
    metrics::{Resolution, SessionMetrics, TrackMetrics, VideoTrackMetrics},
    session::Publisher,
    stats::{
        HighResTimeStamp, MediaKind, RtcOutboundRtpStreamStats,
        RtcRemoteInboundRtpStreamStats, RtcStat, RtcStatsReport,
    },
};

/// Pulls one [`RtcStatsReport`] from the provided [`Publisher`] and derives
/// [`SessionMetrics`] from it and the `previous` tick.
///
/// Returns `None` if the [`Publisher`] can't provide stats, stats retrieval
/// fails or the report has no outbound streams. Such tick carries no data,
/// but is not a failure of the whole test.
pub async fn sample<P>(
    publisher: &P,
    previous: Option<&SessionMetrics>,
) -> Option<SessionMetrics>
where
    P: Publisher + ?Sized,
{
    if !publisher.supports_stats() {
        debug!("Publisher doesn't support stats retrieval");
        return None;
    }
    match publisher.outbound_stats().await {
        Ok(report) if report.outbound_rtp().next().is_none() => {
            debug!("Publisher stats have no outbound streams");
            None
        }
        Ok(report) => Some(extract(&report, previous)),
        Err(e) => {
            debug!("Failed to get publisher stats: {}", e);
            None
        }
    }
}

/// Derives [`SessionMetrics`] from the provided [`RtcStatsReport`] and the
/// [`SessionMetrics`] of the previous tick.
///
/// Streams are matched with their previous samples by SSRC, so simulcast
/// streams may be reordered, added or removed between ticks.
#[must_use]
pub fn extract(
    report: &RtcStatsReport,
    previous: Option<&SessionMetrics>,
) -> SessionMetrics {
    let mut audio = None;
    let mut video = Vec::new();
    for (stat, outbound) in report.outbound_rtp() {
        let remote = report.remote_inbound_for(&stat.id, outbound);
        match outbound.kind {
            MediaKind::Audio => {
                if audio.is_some() {
                    continue;
                }
                let prev = previous
                    .and_then(|p| p.audio.as_ref())
                    .filter(|p| p.stream_id == outbound.ssrc);
                audio = Some(track_metrics(stat, outbound, remote, prev));
            }
            MediaKind::Video => {
                let prev = previous.and_then(|p| {
                    p.video.iter().find(|v| v.stream_id == outbound.ssrc)
                });
                video.push(track_metrics(stat, outbound, remote, prev));
            }
        }
    }

    let pair = report.nominated_candidate_pair();
    let transport_protocol = pair
        .and_then(|p| report.local_candidate(&p.local_candidate_id))
        .and_then(|c| c.protocol.clone());

    SessionMetrics {
        simulcast_enabled: video.len() > 1,
        audio,
        video,
        available_outgoing_bitrate: pair
            .and_then(|p| p.available_outgoing_bitrate),
        current_round_trip_time: pair.and_then(|p| p.current_round_trip_time),
        transport_protocol,
        timestamp: report.latest_timestamp().unwrap_or_default(),
    }
}

/// Builds [`TrackMetrics`] of a single outbound stream.
///
/// A stream without previous sample, or whose byte counter went backwards
/// (restarted stream), is measured as a first sample with zero bitrate. A
/// non-increasing timestamp holds the previous bitrate.
fn track_metrics(
    stat: &RtcStat,
    outbound: &RtcOutboundRtpStreamStats,
    remote: Option<&RtcRemoteInboundRtpStreamStats>,
    previous: Option<&TrackMetrics>,
) -> TrackMetrics {
    #[allow(clippy::cast_sign_loss)]
    let packets_lost = remote
        .and_then(|r| r.packets_lost)
        .map_or(0, |lost| lost.max(0) as u64);

    let mut metrics = TrackMetrics {
        kind: outbound.kind,
        stream_id: outbound.ssrc,
        bytes_sent: outbound.bytes_sent,
        bytes_sent_delta: 0,
        packets_sent: outbound.packets_sent,
        packets_sent_delta: 0,
        packets_lost,
        packets_lost_delta: 0,
        timestamp: stat.timestamp,
        interval_ms: 0.,
        bitrate: 0,
        video: video_metrics(outbound),
    };

    let prev = match previous {
        Some(p) if outbound.bytes_sent >= p.bytes_sent => p,
        _ => return metrics,
    };

    metrics.bytes_sent_delta = outbound.bytes_sent - prev.bytes_sent;
    metrics.packets_sent_delta =
        outbound.packets_sent.saturating_sub(prev.packets_sent);
    metrics.packets_lost_delta = packets_lost.saturating_sub(prev.packets_lost);

    let interval_ms = stat.timestamp.millis_since(prev.timestamp);
    if interval_ms > 0. {
        metrics.interval_ms = interval_ms;
        metrics.bitrate = bitrate(metrics.bytes_sent_delta, interval_ms);
    } else {
        metrics.bitrate = prev.bitrate;
    }
    metrics
}

/// Calculates bitrate in bits per second of `bytes` sent during
/// `interval_ms` milliseconds.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn bitrate(bytes: u64, interval_ms: f64) -> u64 {
    (8. * bytes as f64 / (interval_ms / 1000.)).round() as u64
}

/// Extracts [`VideoTrackMetrics`] from a video [`RtcOutboundRtpStreamStats`].
fn video_metrics(
    outbound: &RtcOutboundRtpStreamStats,
) -> Option<VideoTrackMetrics> {
    if outbound.kind != MediaKind::Video {
        return None;
    }
    let resolution = outbound
        .frame_width
        .zip(outbound.frame_height)
        .map(|(w, h)| Resolution::new(w, h));
    Some(VideoTrackMetrics {
        resolution,
        frame_rate: outbound.frames_per_second,
        quality_limitation_reason: outbound.quality_limitation_reason.clone(),
        pli_count: outbound.pli_count.unwrap_or_default(),
        nack_count: outbound.nack_count.unwrap_or_default(),
        retransmitted_packets_sent: outbound
            .retransmitted_packets_sent
            .unwrap_or_default(),
    })
}

/// Returns the time of the given [`SessionMetrics`] in milliseconds.
#[inline]
pub(crate) fn millis(metrics: &SessionMetrics) -> f64 {
    let HighResTimeStamp(ms) = metrics.timestamp;
    ms
}
