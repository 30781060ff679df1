//! Perceptual models estimating Mean Opinion Score (MOS) from measured
//! network figures.

/// Lowest possible MOS.
pub const MIN_MOS: f64 = 1.0;

/// Highest possible MOS.
pub const MAX_MOS: f64 = 4.5;

/// Basic signal to noise ratio. [ITU-T G.113] provides the common value.
///
/// [ITU-T G.113]: https://itu.int/rec/T-REC-G.113
const R0: f64 = 93.2;

/// Fixed one-way delay in milliseconds added to the measured round trip time
/// to account for jitter buffering and encoding.
const CODEC_DELAY_MS: f64 = 20.;

/// Delay in milliseconds after which delay impairment grows faster.
const DELAY_KNEE_MS: f64 = 177.3;

/// Packet loss robustness factor of the audio codec.
const LOSS_ROBUSTNESS: f64 = 29.7;

/// Impairment applied to audio sent with zero bitrate. Scaled down linearly
/// up to the configured minimum bitrate.
const MAX_BITRATE_IMPAIRMENT: f64 = 60.;

/// Lowest video bitrate in bits per second a picture may be recognized at.
const MIN_VIDEO_BITRATE: f64 = 30_000.;

/// Estimates audio MOS with E-model, introduced in [ITU-T G.107], with some
/// simplifications.
///
/// `bitrate` is in bits per second, `rtt_ms` is round trip time in
/// milliseconds. Packet loss ratio above `max_packet_loss_ratio` always
/// results in [`MIN_MOS`].
///
/// [ITU-T G.107]: https://itu.int/rec/T-REC-G.107
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn audio(
    bitrate: u64,
    packet_loss_ratio: f64,
    rtt_ms: f64,
    min_bitrate: u64,
    max_packet_loss_ratio: f64,
) -> f64 {
    if packet_loss_ratio > max_packet_loss_ratio {
        return MIN_MOS;
    }

    let delay = rtt_ms.max(0.) + CODEC_DELAY_MS;
    let mut delay_impairment = 0.024 * delay;
    if delay > DELAY_KNEE_MS {
        delay_impairment += 0.11 * (delay - DELAY_KNEE_MS);
    }

    let loss_impairment =
        19.8 * (1. + LOSS_ROBUSTNESS * packet_loss_ratio.max(0.)).ln();

    let bitrate_impairment = if bitrate < min_bitrate {
        MAX_BITRATE_IMPAIRMENT * (1. - bitrate as f64 / min_bitrate as f64)
    } else {
        0.
    };

    let r = R0 - delay_impairment - loss_impairment - bitrate_impairment;
    r_to_mos(r)
}

/// Converts the E-model transmission rating factor `R` into MOS.
fn r_to_mos(r: f64) -> f64 {
    let r = r.max(0.).min(100.);
    let mos = 1. + 0.035 * r + 7.1e-6 * r * (r - 60.) * (100. - r);
    mos.max(MIN_MOS).min(MAX_MOS)
}

/// Estimates video MOS of the video of the provided total `pixels` sent
/// with the provided `bitrate` in bits per second.
///
/// Packet loss ratio above `max_packet_loss_ratio` always results in
/// [`MIN_MOS`].
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn video(
    bitrate: u64,
    packet_loss_ratio: f64,
    pixels: u64,
    max_packet_loss_ratio: f64,
) -> f64 {
    let bitrate = bitrate as f64;
    if packet_loss_ratio > max_packet_loss_ratio
        || bitrate < MIN_VIDEO_BITRATE
    {
        return MIN_MOS;
    }

    let target = target_video_bitrate(pixels);
    if bitrate >= target {
        return MAX_MOS;
    }
    let mos = 1.
        + 4. * (bitrate / MIN_VIDEO_BITRATE).ln()
            / (target / MIN_VIDEO_BITRATE).ln();
    mos.max(MIN_MOS).min(MAX_MOS)
}

/// Returns video bitrate in bits per second, at which video of the provided
/// total `pixels` is considered perfect.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn target_video_bitrate(pixels: u64) -> f64 {
    let log = (pixels.max(1) as f64).log10();
    10_f64.powf(2.069_924_867 * log.powf(0.625_022_377_1))
}
