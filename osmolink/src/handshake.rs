//! Pairing handshake
//!
//! Drives a [`ConnectionSession`] from `LinkReady` to exactly one terminal
//! phase:
//!
//! 1. Send the connection request and wait for the camera's reply
//! 2. On acceptance, wait for the user's decision on the camera
//! 3. Acknowledge an approval, or drop the link on denial
//!
//! Camera-initiated frames on the connection command are delivered through
//! an [`ApprovalSlot`] that the dispatcher feeds while a handshake is running.

use osmolink_core::{
    Command, ConnectionSession, Frame,
    pairing::{self, ApprovalNotice, ConnectionRequest, ConnectionResponse},
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::channel::{CommandChannel, SendOptions};
use crate::config::CameraConfig;
use crate::error::{HandshakeError, Result};

/// Terminal result of one pairing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Paired { device_id: u32 },
    Rejected(Rejection),
    TimedOut,
    /// Reply present but unusable
    Failed(String),
}

/// Who said no
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Non-zero return code on the connection reply
    Refused { code: u8 },
    /// User denied on the camera
    Denied { result: u16 },
}

impl HandshakeOutcome {
    /// Device id on success, the matching [`HandshakeError`] otherwise
    pub fn into_result(self) -> std::result::Result<u32, HandshakeError> {
        match self {
            Self::Paired { device_id } => Ok(device_id),
            Self::Rejected(Rejection::Refused { code }) => Err(HandshakeError::Rejected { code }),
            Self::Rejected(Rejection::Denied { result }) => Err(HandshakeError::Denied { result }),
            Self::TimedOut => Err(HandshakeError::TimedOut),
            Self::Failed(reason) => Err(HandshakeError::Malformed(reason)),
        }
    }
}

/// Delivery point for camera-initiated connection frames
#[derive(Debug, Default)]
pub struct ApprovalSlot {
    waiter: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

impl ApprovalSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting frames
    pub fn arm(&self) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.waiter.lock() = Some(tx);
        rx
    }

    /// Pass a frame to the running handshake
    ///
    /// Hands the frame back when no handshake is listening.
    pub fn offer(&self, frame: Frame) -> std::result::Result<(), Frame> {
        match self.waiter.lock().as_ref() {
            Some(tx) => tx.send(frame).map_err(|e| e.0),
            None => Err(frame),
        }
    }

    pub fn disarm(&self) {
        self.waiter.lock().take();
    }

    pub fn is_armed(&self) -> bool {
        self.waiter.lock().is_some()
    }
}

/// Disarms the slot when the handshake returns by any path
struct Armed<'a>(&'a ApprovalSlot);

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.0.disarm();
    }
}

/// Run the handshake on a link that is up with notifications flowing
///
/// `session` must be in `LinkReady`. Protocol outcomes (refusal, denial,
/// silence, malformed reply) are returned as [`HandshakeOutcome`]; the
/// session ends in the matching terminal phase.
///
/// # Errors
///
/// Link errors and an invalid local address are returned as errors; the
/// session is moved to `Failed`.
pub async fn pair(
    channel: &mut CommandChannel,
    approvals: &ApprovalSlot,
    config: &CameraConfig,
    session: &mut ConnectionSession,
) -> Result<HandshakeOutcome> {
    let notices = approvals.arm();
    let _armed = Armed(approvals);

    match run(channel, notices, config, session).await {
        Ok(outcome) => {
            debug!("Handshake finished in {}", session.phase());
            Ok(outcome)
        }
        Err(e) => {
            // Already terminal if the error came after pairing
            let _ = session.fail();
            Err(e)
        }
    }
}

async fn run(
    channel: &mut CommandChannel,
    mut notices: mpsc::UnboundedReceiver<Frame>,
    config: &CameraConfig,
    session: &mut ConnectionSession,
) -> Result<HandshakeOutcome> {
    let request = ConnectionRequest::new(
        session.controller_id(),
        &config.local_address,
        config.first_pairing,
        session.verification_code(),
    )?;

    session.request_sent()?;
    info!(
        "Requesting connection (verification code {:04})",
        session.verification_code()
    );

    let reply = channel
        .send(
            Command::Connection.key(),
            &request.encode(),
            SendOptions::command(config.command_timeout),
        )
        .await?;

    let Some(reply) = reply else {
        warn!("No reply to connection request");
        session.time_out()?;
        return Ok(HandshakeOutcome::TimedOut);
    };

    let response = match ConnectionResponse::parse(&reply) {
        Ok(response) => response,
        Err(e) => {
            warn!("Unusable connection reply: {}", e);
            session.fail()?;
            return Ok(HandshakeOutcome::Failed(e.to_string()));
        }
    };

    if !response.is_accepted() {
        warn!("Connection refused (return code {})", response.return_code);
        session.reject()?;
        return Ok(HandshakeOutcome::Rejected(Rejection::Refused {
            code: response.return_code,
        }));
    }

    session.accept(response.device_id)?;
    info!(
        "Camera accepted request (device 0x{:08X}), waiting for approval",
        response.device_id
    );

    let deadline = Instant::now() + config.approval_timeout;
    loop {
        let frame = match timeout_at(deadline, notices.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                session.fail()?;
                return Ok(HandshakeOutcome::Failed(
                    "approval listener closed".to_string(),
                ));
            }
            Err(_) => {
                warn!("No pairing decision within {:?}", config.approval_timeout);
                session.time_out()?;
                return Ok(HandshakeOutcome::TimedOut);
            }
        };

        let Some(notice) = ApprovalNotice::parse(&frame) else {
            debug!("Ignoring connection frame with {} byte payload", frame.payload.len());
            continue;
        };

        if !notice.is_user_decision() {
            debug!("Ignoring verification mode {}", notice.verify_mode);
            continue;
        }

        if notice.is_approved() {
            channel
                .send(
                    Command::Connection.key(),
                    &pairing::approval_ack(),
                    SendOptions::response(),
                )
                .await?;
            let device_id = session.pair()?;
            info!("Paired with device 0x{:08X}", device_id);
            return Ok(HandshakeOutcome::Paired { device_id });
        }

        warn!(
            "Pairing denied on camera (result 0x{:04X})",
            notice.verify_result
        );
        if let Err(e) = channel.transport_mut().disconnect().await {
            warn!("Disconnect after denial failed: {}", e);
        }
        session.reject()?;
        return Ok(HandshakeOutcome::Rejected(Rejection::Denied {
            result: notice.verify_result,
        }));
    }
}
