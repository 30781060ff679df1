//! Scripted [`MediaSession`] for driving network tests without a media
//! server.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use async_trait::async_trait;
use medea_network_test::{
    metrics::Resolution,
    session::{
        InputDeviceInfo, InputDeviceKind, PublisherSettings, SessionErrorKind,
    },
    stats::{HighResTimeStamp, InboundStats, InboundTrackStats, RtcStatsReport},
    MediaSession, Publisher, SessionError, Subscriber,
};
use serde_json::json;

/// Shared record of the lifecycle calls made to a [`FakeSession`].
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Constant rates of a published test stream.
#[derive(Clone, Copy, Debug)]
pub struct Stream {
    /// Audio bytes sent per second.
    pub audio_bytes_per_sec: u64,

    /// Video bytes sent per second.
    pub video_bytes_per_sec: u64,
}

impl Stream {
    /// 40 kbps audio and 1 Mbps video.
    pub const GOOD: Self = Self {
        audio_bytes_per_sec: 5000,
        video_bytes_per_sec: 125_000,
    };

    /// Silent audio and 1 Mbps video.
    pub const SILENT_AUDIO: Self = Self {
        audio_bytes_per_sec: 0,
        video_bytes_per_sec: 125_000,
    };
}

/// How [`FakeSession::subscribe`] responds.
#[derive(Clone, Debug)]
pub enum SubscribeScript {
    Succeed,
    Missing,
    Fail(SessionError),
}

/// [`MediaSession`] replaying scripted responses.
pub struct FakeSession {
    pub log: CallLog,
    pub connected: Cell<bool>,
    pub environment: Result<(), String>,
    pub connect_error: Option<SessionError>,
    pub devices: Result<Vec<InputDeviceInfo>, SessionError>,
    pub resolution_error: Option<SessionError>,
    pub publish_error: Option<SessionError>,
    pub subscribe: SubscribeScript,
    pub streams: RefCell<VecDeque<Stream>>,
    pub published: Rc<RefCell<Vec<PublisherSettings>>>,
    pub hang_disconnect: bool,
    pub publishes: Cell<u32>,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            connected: Cell::new(false),
            environment: Ok(()),
            connect_error: None,
            devices: Ok(vec![microphone(), camera()]),
            resolution_error: None,
            publish_error: None,
            subscribe: SubscribeScript::Succeed,
            streams: RefCell::new(VecDeque::new()),
            published: Rc::default(),
            hang_disconnect: false,
            publishes: Cell::new(0),
        }
    }
}

impl FakeSession {
    /// Creates a [`FakeSession`] publishing the provided [`Stream`]s, one per
    /// publish call. The last one is repeated.
    pub fn with_streams<I: IntoIterator<Item = Stream>>(streams: I) -> Self {
        Self {
            streams: RefCell::new(streams.into_iter().collect()),
            ..Self::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.log.borrow_mut().push(call.into());
    }

    fn next_stream(&self) -> Stream {
        let mut streams = self.streams.borrow_mut();
        if streams.len() > 1 {
            streams.pop_front().unwrap()
        } else {
            streams.front().copied().unwrap_or(Stream::GOOD)
        }
    }
}

pub fn microphone() -> InputDeviceInfo {
    InputDeviceInfo {
        device_id: "mic".to_owned(),
        kind: InputDeviceKind::AudioInput,
        label: "Microphone".to_owned(),
    }
}

pub fn camera() -> InputDeviceInfo {
    InputDeviceInfo {
        device_id: "cam".to_owned(),
        kind: InputDeviceKind::VideoInput,
        label: "Camera".to_owned(),
    }
}

#[async_trait(?Send)]
impl MediaSession for FakeSession {
    type Publisher = FakePublisher;
    type Subscriber = FakeSubscriber;

    fn check_environment(&self) -> Result<(), String> {
        self.environment.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    async fn connect(&self) -> Result<(), SessionError> {
        self.record("connect");
        if let Some(e) = &self.connect_error {
            return Err(e.clone());
        }
        self.connected.set(true);
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<InputDeviceInfo>, SessionError> {
        self.record("devices");
        self.devices.clone()
    }

    async fn check_camera_resolution(
        &self,
        _: Option<&str>,
        resolution: Resolution,
    ) -> Result<(), SessionError> {
        self.record(format!("check_camera_resolution {}", resolution));
        self.resolution_error.clone().map_or(Ok(()), Err)
    }

    async fn publish(
        &self,
        settings: PublisherSettings,
    ) -> Result<Self::Publisher, SessionError> {
        let id = self.publishes.get() + 1;
        self.publishes.set(id);
        self.record(format!("publish#{}", id));
        self.published.borrow_mut().push(settings.clone());
        if let Some(e) = &self.publish_error {
            return Err(e.clone());
        }
        Ok(FakePublisher {
            id,
            calls: Cell::new(0),
            stream: self.next_stream(),
            video: settings.publish_video,
        })
    }

    async fn subscribe(
        &self,
        publisher: &Self::Publisher,
    ) -> Result<Option<Self::Subscriber>, SessionError> {
        self.record(format!("subscribe#{}", publisher.id));
        match &self.subscribe {
            SubscribeScript::Succeed => {
                Ok(Some(FakeSubscriber { id: publisher.id }))
            }
            SubscribeScript::Missing => Ok(None),
            SubscribeScript::Fail(e) => Err(e.clone()),
        }
    }

    async fn unsubscribe(&self, subscriber: Self::Subscriber) {
        self.record(format!("unsubscribe#{}", subscriber.id));
    }

    async fn unpublish(&self, publisher: Self::Publisher) {
        self.record(format!("unpublish#{}", publisher.id));
    }

    async fn disconnect(&self) {
        self.record("disconnect");
        if self.hang_disconnect {
            std::future::pending::<()>().await;
        }
        self.connected.set(false);
    }
}

/// [`Publisher`] of a constant rate [`Stream`], reporting one second of
/// stats per call.
pub struct FakePublisher {
    id: u32,
    calls: Cell<u64>,
    stream: Stream,
    video: bool,
}

#[async_trait(?Send)]
impl Publisher for FakePublisher {
    async fn outbound_stats(&self) -> Result<RtcStatsReport, SessionError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        #[allow(clippy::cast_precision_loss)]
        let ts = n as f64 * 1000.;

        let mut stats = vec![
            json!({
                "id": "audio",
                "timestamp": ts,
                "type": "outbound-rtp",
                "ssrc": 1,
                "kind": "audio",
                "bytesSent": n * self.stream.audio_bytes_per_sec,
                "packetsSent": n * 50,
            }),
            json!({
                "id": "pair",
                "timestamp": ts,
                "type": "candidate-pair",
                "localCandidateId": "local",
                "remoteCandidateId": "remote",
                "nominated": true,
                "currentRoundTripTime": 0.05,
                "availableOutgoingBitrate": 2_000_000.,
            }),
            json!({
                "id": "local",
                "timestamp": ts,
                "type": "local-candidate",
                "protocol": "udp",
            }),
        ];
        if self.video {
            stats.push(json!({
                "id": "video",
                "timestamp": ts,
                "type": "outbound-rtp",
                "ssrc": 2,
                "kind": "video",
                "bytesSent": n * self.stream.video_bytes_per_sec,
                "packetsSent": n * 100,
                "frameWidth": 1280,
                "frameHeight": 720,
                "framesPerSecond": 30.,
            }));
        }
        serde_json::from_value(json!(stats)).map_err(|e| {
            SessionError::new(SessionErrorKind::Other, e.to_string())
        })
    }
}

/// [`Subscriber`] receiving everything with a small constant loss.
pub struct FakeSubscriber {
    id: u32,
}

#[async_trait(?Send)]
impl Subscriber for FakeSubscriber {
    async fn inbound_stats(&self) -> Result<InboundStats, SessionError> {
        Ok(InboundStats {
            audio: InboundTrackStats {
                bytes_received: 4000,
                packets_lost: 1,
                packets_received: 49,
                frame_rate: None,
            },
            video: Some(InboundTrackStats {
                bytes_received: 120_000,
                packets_lost: 2,
                packets_received: 98,
                frame_rate: Some(30.),
            }),
            timestamp: HighResTimeStamp(1000.),
        })
    }
}
