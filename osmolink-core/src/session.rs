//! Pairing session state
//!
//! A session lives for exactly one connect attempt and tracks:
//! - Controller id presented to the camera
//! - Locally generated verification code
//! - Device id assigned by the camera (once accepted)
//! - Current handshake phase
//!
//! ```text
//! Disconnected → LinkReady → RequestSent → AwaitingApproval → Paired
//!                                 │               │
//!                                 └───────────────┴──→ Rejected | TimedOut | Failed
//! ```

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::pairing;

/// Handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// No link to the camera
    Disconnected,

    /// Link established, notifications enabled
    LinkReady,

    /// Connection request written, waiting for the camera's reply
    RequestSent,

    /// Camera accepted the request; waiting for the user to approve on-device
    AwaitingApproval { device_id: u32 },

    /// Pairing complete
    Paired { device_id: u32 },

    /// Camera refused the request or the user denied it
    Rejected,

    /// Camera went silent
    TimedOut,

    /// Link failure or malformed reply
    Failed,
}

impl HandshakePhase {
    /// Check if the attempt is over
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Paired { .. } | Self::Rejected | Self::TimedOut | Self::Failed
        )
    }

    /// Check if a reply from the camera is outstanding
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::RequestSent | Self::AwaitingApproval { .. })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::LinkReady => "LINK_READY",
            Self::RequestSent => "REQUEST_SENT",
            Self::AwaitingApproval { .. } => "AWAITING_APPROVAL",
            Self::Paired { .. } => "PAIRED",
            Self::Rejected => "REJECTED",
            Self::TimedOut => "TIMED_OUT",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingApproval { device_id } | Self::Paired { device_id } => {
                write!(f, "{}(device=0x{:08X})", self.name(), device_id)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Transient state of one pairing attempt
///
/// Created at the start of a connect attempt and discarded once a terminal
/// phase is reached. A new attempt always starts from a fresh session.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    controller_id: u32,
    verification_code: u16,
    device_id: Option<u32>,
    phase: HandshakePhase,
}

impl ConnectionSession {
    /// Create a disconnected session
    pub fn new(controller_id: u32, verification_code: u16) -> Self {
        Self {
            controller_id,
            verification_code,
            device_id: None,
            phase: HandshakePhase::Disconnected,
        }
    }

    /// Create a disconnected session with a random verification code
    pub fn with_random_code(controller_id: u32) -> Self {
        Self::new(controller_id, pairing::random_verification_code())
    }

    pub fn controller_id(&self) -> u32 {
        self.controller_id
    }

    pub fn verification_code(&self) -> u16 {
        self.verification_code
    }

    /// Device id, set once the camera accepts the request
    pub fn device_id(&self) -> Option<u32> {
        self.device_id
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn is_paired(&self) -> bool {
        matches!(self.phase, HandshakePhase::Paired { .. })
    }

    /// Link is up and notifications are flowing
    pub fn link_ready(&mut self) -> Result<()> {
        self.transition(
            matches!(self.phase, HandshakePhase::Disconnected),
            HandshakePhase::LinkReady,
        )
    }

    /// Connection request has been written
    pub fn request_sent(&mut self) -> Result<()> {
        self.transition(
            matches!(self.phase, HandshakePhase::LinkReady),
            HandshakePhase::RequestSent,
        )
    }

    /// Camera accepted the request and assigned `device_id`
    pub fn accept(&mut self, device_id: u32) -> Result<()> {
        self.transition(
            matches!(self.phase, HandshakePhase::RequestSent),
            HandshakePhase::AwaitingApproval { device_id },
        )?;
        self.device_id = Some(device_id);
        Ok(())
    }

    /// User approved on the camera
    pub fn pair(&mut self) -> Result<u32> {
        let HandshakePhase::AwaitingApproval { device_id } = self.phase else {
            return Err(self.invalid(HandshakePhase::Paired { device_id: 0 }));
        };
        self.transition(true, HandshakePhase::Paired { device_id })?;
        Ok(device_id)
    }

    /// Camera refused or the user denied
    pub fn reject(&mut self) -> Result<()> {
        self.transition(self.phase.is_waiting(), HandshakePhase::Rejected)
    }

    /// Camera did not answer in time
    pub fn time_out(&mut self) -> Result<()> {
        self.transition(self.phase.is_waiting(), HandshakePhase::TimedOut)
    }

    /// Attempt aborted from any non-terminal phase
    pub fn fail(&mut self) -> Result<()> {
        self.transition(!self.phase.is_terminal(), HandshakePhase::Failed)
    }

    fn transition(&mut self, allowed: bool, next: HandshakePhase) -> Result<()> {
        if !allowed {
            return Err(self.invalid(next));
        }
        debug!("Session {} -> {}", self.phase.name(), next.name());
        self.phase = next;
        Ok(())
    }

    fn invalid(&self, next: HandshakePhase) -> Error {
        Error::InvalidSessionState(format!(
            "Cannot move from {} to {}",
            self.phase.name(),
            next.name()
        ))
    }
}
