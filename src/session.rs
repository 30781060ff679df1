//! Boundary of the media session collaborator the network test is run
//! against.
//!
//! The network test never establishes connections or captures media by
//! itself. It drives an implementation of [`MediaSession`] and treats the
//! [`Publisher`]s and [`Subscriber`]s it produces as opaque sources of
//! statistics.

use async_trait::async_trait;
use derive_more::Display;

use crate::{
    metrics::Resolution,
    stats::{InboundStats, RtcStatsReport},
};

/// Kind of a [`SessionError`], as reported by the media session.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SessionErrorKind {
    /// Session credentials were rejected.
    Authentication,

    /// Session ID is malformed or unknown.
    InvalidSessionId,

    /// Connection to the media server couldn't be established.
    ConnectFailed,

    /// Operation requires an established connection.
    NotConnected,

    /// Stream couldn't be published.
    UnableToPublish,

    /// Requested media constraints can't be satisfied by a device.
    Overconstrained,

    /// Access to a capture device was denied.
    NotAllowed,

    /// Any other failure.
    Other,
}

/// Failure reported by a [`MediaSession`] collaborator.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(fmt = "{}: {}", kind, message)]
pub struct SessionError {
    /// Kind of this [`SessionError`].
    pub kind: SessionErrorKind,

    /// Human-readable description provided by the collaborator.
    pub message: String,
}

impl SessionError {
    /// Creates a new [`SessionError`].
    #[must_use]
    pub fn new<M: Into<String>>(kind: SessionErrorKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Kind of an input media device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputDeviceKind {
    /// Microphone.
    AudioInput,

    /// Camera.
    VideoInput,
}

/// Information about an available input media device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputDeviceInfo {
    /// Unique identifier of the device.
    pub device_id: String,

    /// Kind of the device.
    pub kind: InputDeviceKind,

    /// Human-readable label of the device.
    pub label: String,
}

/// Settings of a test stream publishing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublisherSettings {
    /// ID of the microphone to publish. Default device if `None`.
    pub audio_source: Option<String>,

    /// Indicates whether video should be published at all.
    pub publish_video: bool,

    /// ID of the camera to publish. Default device if `None`.
    pub video_source: Option<String>,

    /// Requested video resolution.
    pub resolution: Resolution,

    /// Indicates whether simulcast should be requested for the video.
    pub scalable_video: bool,
}

/// Media session the network test runs in.
///
/// All the lifecycle acknowledging methods (`unsubscribe`, `unpublish`,
/// `disconnect`) resolve once the corresponding resource is confirmed to be
/// released.
#[async_trait(?Send)]
pub trait MediaSession {
    /// Published test stream handle.
    type Publisher: Publisher;

    /// Handle of a subscription to the published test stream.
    type Subscriber: Subscriber;

    /// Checks that the host is able to capture and publish media.
    ///
    /// # Errors
    ///
    /// With a description of the missing capability.
    fn check_environment(&self) -> Result<(), String>;

    /// Indicates whether this [`MediaSession`] is connected already.
    fn is_connected(&self) -> bool;

    /// Connects this [`MediaSession`] to the media server.
    async fn connect(&self) -> Result<(), SessionError>;

    /// Enumerates available input media devices.
    async fn devices(&self) -> Result<Vec<InputDeviceInfo>, SessionError>;

    /// Checks that the camera with the provided ID (or the default one) is
    /// able to capture video of exactly the provided [`Resolution`].
    async fn check_camera_resolution(
        &self,
        device_id: Option<&str>,
        resolution: Resolution,
    ) -> Result<(), SessionError>;

    /// Creates and publishes a test stream.
    async fn publish(
        &self,
        settings: PublisherSettings,
    ) -> Result<Self::Publisher, SessionError>;

    /// Subscribes to the provided published stream.
    ///
    /// Resolves to `None` if the remote stream never appeared.
    async fn subscribe(
        &self,
        publisher: &Self::Publisher,
    ) -> Result<Option<Self::Subscriber>, SessionError>;

    /// Destroys the provided subscription.
    async fn unsubscribe(&self, subscriber: Self::Subscriber);

    /// Stops publishing and destroys the provided stream.
    async fn unpublish(&self, publisher: Self::Publisher);

    /// Disconnects this [`MediaSession`].
    async fn disconnect(&self);
}

/// Published test stream.
#[async_trait(?Send)]
pub trait Publisher {
    /// Indicates whether this [`Publisher`] is able to provide statistics.
    fn supports_stats(&self) -> bool {
        true
    }

    /// Returns a snapshot of outbound transport statistics.
    async fn outbound_stats(&self) -> Result<RtcStatsReport, SessionError>;
}

/// Subscription to the published test stream.
#[async_trait(?Send)]
pub trait Subscriber {
    /// Returns statistics of the received media.
    async fn inbound_stats(&self) -> Result<InboundStats, SessionError>;
}
