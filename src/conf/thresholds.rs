//! Quality verdict thresholds.

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Thresholds deciding whether measured quality is acceptable.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// Audio thresholds.
    pub audio: AudioThresholds,

    /// Video thresholds.
    pub video: VideoThresholds,
}

/// Audio quality thresholds.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct AudioThresholds {
    /// Minimum MOS for audio to be considered supported. Defaults to `2.4`.
    #[default(2.4)]
    pub min_mos: f64,

    /// Bitrate (bits per second) below which audio MOS is penalized.
    /// Defaults to `25000`.
    #[default(25_000)]
    pub min_bitrate: u64,

    /// Packet loss ratio above which audio MOS is forced to the minimum.
    /// Defaults to `0.05`.
    #[default(0.05)]
    pub max_packet_loss_ratio: f64,
}

/// Video quality thresholds.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct VideoThresholds {
    /// Minimum MOS for video to be considered supported. Defaults to `2.4`.
    #[default(2.4)]
    pub min_mos: f64,

    /// Packet loss ratio above which video MOS is forced to the minimum.
    /// Defaults to `0.05`.
    #[default(0.05)]
    pub max_packet_loss_ratio: f64,
}

#[cfg(test)]
mod spec {
    use serial_test::serial;

    use crate::{conf::Conf, overrided_by_env_conf};

    #[test]
    #[serial]
    fn overrides_defaults() {
        let default_conf = Conf::default();
        let env_conf = overrided_by_env_conf!(
            "MEDEA_NETWORK_TEST_THRESHOLDS__AUDIO__MIN_MOS" => "3.1",
            "MEDEA_NETWORK_TEST_THRESHOLDS__VIDEO__MAX_PACKET_LOSS_RATIO" => "0.1",
        );

        assert!(
            (default_conf.thresholds.audio.min_mos - 2.4).abs() < f64::EPSILON
        );
        assert!((env_conf.thresholds.audio.min_mos - 3.1).abs() < f64::EPSILON);
        assert!(
            (env_conf.thresholds.video.max_packet_loss_ratio - 0.1).abs()
                < f64::EPSILON
        );
        assert_eq!(
            env_conf.thresholds.audio.min_bitrate,
            default_conf.thresholds.audio.min_bitrate,
        );
    }
}
