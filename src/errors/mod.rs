//! Errors a network test may fail with.

use derive_more::{Display, From};

use crate::session::{SessionError, SessionErrorKind};

/// Fatal failure of a network test.
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum QualityTestError {
    /// Host is unable to capture or publish media.
    #[display(fmt = "Unsupported environment: {}", _0)]
    #[from(ignore)]
    UnsupportedEnvironment(String),

    /// Local media couldn't be acquired.
    #[display(fmt = "Failed to acquire local media: {}", _0)]
    Acquisition(AcquisitionError),

    /// Session couldn't be connected.
    #[display(fmt = "Failed to connect to session: {}", _0)]
    Connect(ConnectError),

    /// Test stream couldn't be published.
    #[display(fmt = "Failed to publish test stream: {}", _0)]
    Publish(PublishError),

    /// Test stream couldn't be subscribed to.
    #[display(fmt = "Failed to subscribe to test stream: {}", _0)]
    Subscribe(SubscribeError),

    /// Published test stream never appeared on the remote side.
    #[display(fmt = "Test stream wasn't received")]
    #[from(ignore)]
    MissingSubscriber,
}

impl QualityTestError {
    /// Returns machine-readable name of this [`QualityTestError`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        use AcquisitionError as A;
        use ConnectError as C;
        use PublishError as P;

        match self {
            Self::UnsupportedEnvironment(_) => "UnsupportedBrowserError",
            Self::Acquisition(A::FailedToObtainMediaDevices) => {
                "FailedToObtainMediaDevices"
            }
            Self::Acquisition(A::NoAudioCaptureDevices) => {
                "NoAudioCaptureDevicesError"
            }
            Self::Acquisition(A::UnsupportedResolution) => {
                "UnsupportedResolutionError"
            }
            Self::Acquisition(A::PermissionDenied) => "PermissionDeniedError",
            Self::Connect(C::Authentication) => "ConnectToSessionTokenError",
            Self::Connect(C::InvalidSessionId) => {
                "ConnectToSessionSessionIdError"
            }
            Self::Connect(C::Network) => "ConnectToSessionNetworkError",
            Self::Connect(C::Other(_)) => "ConnectToSessionError",
            Self::Publish(P::InitPublisher(_)) => "InitPublisherError",
            Self::Publish(P::NotConnected) => {
                "PublishToSessionNotConnectedError"
            }
            Self::Publish(P::PermissionOrTimeout) => {
                "PublishToSessionPermissionOrTimeoutError"
            }
            Self::Publish(P::Other(_)) => "PublishToSessionError",
            Self::Subscribe(_) => "SubscribeToSessionError",
            Self::MissingSubscriber => "MissingSubscriberError",
        }
    }
}

/// Failure to acquire local media.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum AcquisitionError {
    /// Media devices couldn't be enumerated.
    #[display(fmt = "Failed to obtain media devices")]
    FailedToObtainMediaDevices,

    /// There are no microphones.
    #[display(fmt = "No audio capture devices found")]
    NoAudioCaptureDevices,

    /// Camera can't capture video of the requested resolution.
    #[display(fmt = "Requested resolution isn't supported by the camera")]
    UnsupportedResolution,

    /// Access to a capture device was denied.
    #[display(fmt = "Access to a capture device was denied")]
    PermissionDenied,
}

impl AcquisitionError {
    /// Classifies a [`SessionError`] of a camera resolution check.
    ///
    /// Only an unsatisfiable constraint means the resolution is unsupported.
    /// Any other failure means the camera couldn't be opened at all.
    #[must_use]
    pub fn from_resolution_check(err: &SessionError) -> Self {
        match err.kind {
            SessionErrorKind::Overconstrained => Self::UnsupportedResolution,
            SessionErrorKind::NotAllowed => Self::PermissionDenied,
            _ => Self::FailedToObtainMediaDevices,
        }
    }
}

/// Failure to connect to a session.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ConnectError {
    /// Session credentials were rejected.
    #[display(fmt = "Invalid credentials")]
    Authentication,

    /// Session ID is invalid.
    #[display(fmt = "Invalid session ID")]
    InvalidSessionId,

    /// Media server is unreachable.
    #[display(fmt = "Media server is unreachable")]
    Network,

    /// Any other failure.
    #[display(fmt = "{}", _0)]
    Other(String),
}

impl From<SessionError> for ConnectError {
    fn from(err: SessionError) -> Self {
        match err.kind {
            SessionErrorKind::Authentication => Self::Authentication,
            SessionErrorKind::InvalidSessionId => Self::InvalidSessionId,
            SessionErrorKind::ConnectFailed => Self::Network,
            _ => Self::Other(err.message),
        }
    }
}

/// Failure to publish a test stream.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum PublishError {
    /// Publisher couldn't be initialized.
    #[display(fmt = "Failed to init publisher: {}", _0)]
    InitPublisher(String),

    /// Session isn't connected.
    #[display(fmt = "Session isn't connected")]
    NotConnected,

    /// Media access wasn't granted or publishing timed out.
    #[display(fmt = "Media access denied or publishing timed out")]
    PermissionOrTimeout,

    /// Any other failure.
    #[display(fmt = "{}", _0)]
    Other(String),
}

impl From<SessionError> for PublishError {
    fn from(err: SessionError) -> Self {
        match err.kind {
            SessionErrorKind::NotConnected => Self::NotConnected,
            SessionErrorKind::UnableToPublish => Self::PermissionOrTimeout,
            SessionErrorKind::NotAllowed
            | SessionErrorKind::Overconstrained => {
                Self::InitPublisher(err.message)
            }
            _ => Self::Other(err.message),
        }
    }
}

/// Failure to subscribe to a test stream.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(fmt = "{}", _0)]
pub struct SubscribeError(pub String);

impl From<SessionError> for SubscribeError {
    #[inline]
    fn from(err: SessionError) -> Self {
        Self(err.to_string())
    }
}
