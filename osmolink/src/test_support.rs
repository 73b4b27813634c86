//! Scripted camera for unit tests

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use osmolink_core::{
    AckType, Command, CommandKey, Frame, FrameType, constants::pairing::VERIFY_MODE_USER_APPROVAL,
};
use osmolink_transport::{MemoryPeer, MemoryTransport, PeerLink, Peripheral, Transport};
use osmolink_types::CameraStatus;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{CommandChannel, ResponseSlot};
use crate::config::CameraConfig;
use crate::dispatch::Dispatcher;
use crate::handshake::ApprovalSlot;
use crate::telemetry::TelemetryDecoder;

pub(crate) const DEVICE_ID: u32 = 0x1234_5678;
pub(crate) const CAMERA_NAME: &str = "Osmo360-1A2B";

/// How the camera answers a connection request
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pairing {
    Approve,
    /// Irrelevant connection frames before the approval
    ApproveAfterNoise,
    Deny(u16),
    Refuse(u8),
    /// Accepts the request, then never decides
    Undecided,
    NoReply,
    /// Reply too short to carry a device id
    ShortReply,
}

pub(crate) fn encode(key: CommandKey, payload: &[u8], frame_type: FrameType) -> Bytes {
    Frame::encode(key, payload, frame_type, AckType::Desired)
        .unwrap()
        .freeze()
}

pub(crate) fn connection_frame(frame_type: FrameType, payload: &[u8]) -> Frame {
    Frame::decode(&encode(Command::Connection.key(), payload, frame_type)).unwrap()
}

pub(crate) fn status_frame(payload: &[u8]) -> Frame {
    Frame::decode(&encode(
        Command::CameraStatusPush.key(),
        payload,
        FrameType::Command,
    ))
    .unwrap()
}

/// Status payload with the given mode and battery level
pub(crate) fn status_payload(mode: u8, battery: u8) -> Vec<u8> {
    let mut payload = vec![0u8; CameraStatus::MIN_SIZE];
    payload[0] = mode;
    payload[37] = battery;
    payload
}

pub(crate) fn approval_payload(mode: u8, result: u16) -> Vec<u8> {
    let mut payload = vec![0u8; 33];
    payload[26] = mode;
    payload[27..29].copy_from_slice(&result.to_le_bytes());
    payload
}

fn accept_payload(code: u8) -> Vec<u8> {
    let mut payload = DEVICE_ID.to_le_bytes().to_vec();
    payload.push(code);
    payload.extend_from_slice(&[0; 4]);
    payload
}

/// Camera peer answering writes from a script
///
/// Every decoded client frame is logged for inspection. Commands other than
/// the connection request get a Response whose payload is the current reply
/// code, or no answer while the reply code is `None`.
pub(crate) struct ScriptedCamera {
    link: PeerLink,
    received: mpsc::UnboundedReceiver<Frame>,
    reply_code: Arc<Mutex<Option<u8>>>,
    task: JoinHandle<()>,
}

/// A connected command channel with its dispatcher, for component tests
pub(crate) struct Rig {
    pub channel: CommandChannel,
    pub approvals: Arc<ApprovalSlot>,
    pub telemetry: Arc<TelemetryDecoder>,
    pub config: CameraConfig,
    pub camera: ScriptedCamera,
    // Ends once the channel's transport is dropped
    _dispatcher: JoinHandle<()>,
}

pub(crate) fn test_config() -> CameraConfig {
    CameraConfig::default()
        .with_command_timeout(Duration::from_secs(1))
        .with_approval_timeout(Duration::from_secs(2))
}

impl ScriptedCamera {
    /// Unconnected transport advertising one camera, plus its script
    pub(crate) fn transport(pairing: Pairing) -> (MemoryTransport, Self) {
        let (transport, peer) = MemoryTransport::new(vec![
            Peripheral::new("Headphones", "11:22:33:44:55:66"),
            Peripheral::new(CAMERA_NAME, "AA:BB:CC:DD:EE:FF"),
        ]);
        (transport, Self::spawn(peer, pairing))
    }

    /// Connected channel, dispatcher and camera
    pub(crate) async fn rig(pairing: Pairing) -> Rig {
        let (mut transport, camera) = Self::transport(pairing);
        let config = test_config();

        let found = transport
            .discover(&config.name_filter, config.scan_duration)
            .await
            .unwrap();
        transport.connect(&found[0]).await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        transport
            .subscribe(&config.notify_characteristic, tx)
            .await
            .unwrap();

        let responses = Arc::new(ResponseSlot::new());
        let approvals = Arc::new(ApprovalSlot::new());
        let telemetry = Arc::new(TelemetryDecoder::new());
        let dispatcher =
            Dispatcher::new(responses.clone(), approvals.clone(), telemetry.clone()).spawn(rx);

        let channel = CommandChannel::new(
            Box::new(transport),
            responses,
            config.write_characteristic.clone(),
        );

        Rig {
            channel,
            approvals,
            telemetry,
            config,
            camera,
            _dispatcher: dispatcher,
        }
    }

    fn spawn(peer: MemoryPeer, pairing: Pairing) -> Self {
        let link = peer.link();
        let reply_code = Arc::new(Mutex::new(Some(0)));
        let (log, received) = mpsc::unbounded_channel();

        let task = tokio::spawn(script(peer, pairing, reply_code.clone(), log));

        Self {
            link,
            received,
            reply_code,
            task,
        }
    }

    /// Next frame written by the client
    pub(crate) async fn received(&mut self) -> Frame {
        self.received.recv().await.unwrap()
    }

    /// Every frame written so far
    pub(crate) fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.received.try_recv().ok()).collect()
    }

    pub(crate) fn push(&self, data: impl Into<Bytes>) {
        self.link.notify(data).unwrap();
    }

    pub(crate) fn push_status(&self, mode: u8, battery: u8) {
        self.push(encode(
            Command::CameraStatusPush.key(),
            &status_payload(mode, battery),
            FrameType::Command,
        ));
    }

    /// Reply code for ordinary commands; `None` makes the camera silent
    pub(crate) fn set_reply(&self, code: Option<u8>) {
        *self.reply_code.lock() = code;
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.link.fail_writes(fail);
    }
}

impl Drop for ScriptedCamera {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn script(
    mut peer: MemoryPeer,
    pairing: Pairing,
    reply_code: Arc<Mutex<Option<u8>>>,
    log: mpsc::UnboundedSender<Frame>,
) {
    while let Some(write) = peer.next_write().await {
        let Ok(frame) = Frame::decode(&write.data) else {
            continue;
        };
        let _ = log.send(frame.clone());

        if frame.is_response() {
            continue;
        }

        if frame.is(Command::Connection) {
            answer_connection(&peer, pairing);
            continue;
        }

        let code = *reply_code.lock();
        if let Some(code) = code {
            let _ = peer.notify(encode(frame.key(), &[code], FrameType::Response));
        }
    }
}

fn answer_connection(peer: &MemoryPeer, pairing: Pairing) {
    let key = Command::Connection.key();
    let respond = |payload: &[u8]| {
        let _ = peer.notify(encode(key, payload, FrameType::Response));
    };
    let notice = |payload: &[u8]| {
        let _ = peer.notify(encode(key, payload, FrameType::Command));
    };
    let decision = |result: u16| approval_payload(VERIFY_MODE_USER_APPROVAL, result);

    match pairing {
        Pairing::NoReply => {}
        Pairing::ShortReply => respond(&[0x78, 0x56]),
        Pairing::Refuse(code) => respond(&accept_payload(code)),
        Pairing::Undecided => respond(&accept_payload(0)),
        Pairing::Approve => {
            respond(&accept_payload(0));
            notice(&decision(0));
        }
        Pairing::ApproveAfterNoise => {
            respond(&accept_payload(0));
            notice(&[0; 10]);
            notice(&approval_payload(1, 0x0101));
            let _ = peer.notify(encode(
                Command::CameraStatusPush.key(),
                &status_payload(0x3F, 90),
                FrameType::Command,
            ));
            notice(&decision(0));
        }
        Pairing::Deny(result) => {
            respond(&accept_payload(0));
            notice(&decision(result));
        }
    }
}
