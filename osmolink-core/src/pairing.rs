//! Pairing payloads
//!
//! The pairing exchange is carried on [`Command::Connection`] in both
//! directions:
//!
//! 1. Controller sends a [`ConnectionRequest`] (Command frame)
//! 2. Camera answers with a [`ConnectionResponse`] (Response frame)
//! 3. Camera later sends an [`ApprovalNotice`] (Command frame) once the user
//!    has decided on-device
//! 4. Controller acknowledges with [`approval_ack`] (Response frame)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::Rng;

use crate::{
    command::Command,
    constants::pairing::{
        ACK_MAGIC, CLIENT_ID_LEN, MAX_VERIFICATION_CODE, PROTOCOL_VERSION,
        VERIFY_MODE_USER_APPROVAL,
    },
    error::{Error, Result},
    frame::{Frame, FrameType},
};

/// Pick a verification code in `0..=9999`
pub fn random_verification_code() -> u16 {
    rand::thread_rng().gen_range(0..=MAX_VERIFICATION_CODE)
}

/// Build the 16-byte client identifier from a local address
///
/// Accepts six hex octets separated by `:` or `-` (or not separated at
/// all); the remaining ten bytes are zero.
///
/// # Examples
///
/// ```
/// use osmolink_core::pairing;
///
/// let id = pairing::client_id_from_address("38-34-56-78-9A-BC").unwrap();
/// assert_eq!(&id[..6], &[0x38, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
/// assert_eq!(&id[6..], &[0u8; 10]);
/// ```
pub fn client_id_from_address(address: &str) -> Result<[u8; CLIENT_ID_LEN]> {
    let digits: String = address
        .chars()
        .filter(|c| !matches!(c, ':' | '-'))
        .collect();

    let octets = hex::decode(&digits)
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?;

    if octets.len() != 6 {
        return Err(Error::InvalidAddress(format!(
            "{}: expected 6 octets, got {}",
            address,
            octets.len()
        )));
    }

    let mut id = [0u8; CLIENT_ID_LEN];
    id[..6].copy_from_slice(&octets);
    Ok(id)
}

/// Connection request sent by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub controller_id: u32,
    pub client_id: [u8; CLIENT_ID_LEN],
    pub first_pairing: bool,
    pub verification_code: u16,
}

impl ConnectionRequest {
    /// Encoded size in bytes
    pub const SIZE: usize = 33;

    pub fn new(
        controller_id: u32,
        local_address: &str,
        first_pairing: bool,
        verification_code: u16,
    ) -> Result<Self> {
        Ok(Self {
            controller_id,
            client_id: client_id_from_address(local_address)?,
            first_pairing,
            verification_code,
        })
    }

    /// Encode the request payload
    ///
    /// ```text
    /// [controller_id u32][version u8][client_id 16][reserved u32]
    /// [reserved u8][first_pairing u8][verification_code u16][reserved 4]
    /// ```
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u32_le(self.controller_id);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_slice(&self.client_id);
        buf.put_u32_le(0);
        buf.put_u8(0);
        buf.put_u8(u8::from(self.first_pairing));
        buf.put_u16_le(self.verification_code);
        buf.put_slice(&[0; 4]);
        buf.freeze()
    }
}

/// Camera's immediate reply to a [`ConnectionRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionResponse {
    pub device_id: u32,
    pub return_code: u8,
}

impl ConnectionResponse {
    /// Minimum payload size
    pub const MIN_SIZE: usize = 5;

    /// Parse from a decoded frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] if the frame is not a Response on
    /// the connection command or is too short.
    pub fn parse(frame: &Frame) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedPayload {
            command: Command::Connection.key(),
            reason,
        };

        if !frame.is(Command::Connection) {
            return Err(malformed(format!("reply on {}", frame.key())));
        }
        if frame.frame_type != FrameType::Response {
            return Err(malformed("reply is not a response frame".into()));
        }
        if frame.payload.len() < Self::MIN_SIZE {
            return Err(malformed(format!(
                "{} bytes, need {}",
                frame.payload.len(),
                Self::MIN_SIZE
            )));
        }

        let mut payload = frame.payload.clone();
        let device_id = payload.get_u32_le();
        let return_code = payload.get_u8();

        Ok(Self {
            device_id,
            return_code,
        })
    }

    pub fn is_accepted(&self) -> bool {
        self.return_code == 0
    }
}

/// Camera's pairing decision, pushed after the user acts on-device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalNotice {
    pub verify_mode: u8,
    pub verify_result: u16,
}

impl ApprovalNotice {
    /// Minimum payload size
    pub const MIN_SIZE: usize = 29;

    const MODE_OFFSET: usize = 26;

    /// Parse from a decoded frame, `None` if it is not an approval notice
    pub fn parse(frame: &Frame) -> Option<Self> {
        if !frame.is(Command::Connection)
            || frame.frame_type != FrameType::Command
            || frame.payload.len() < Self::MIN_SIZE
        {
            return None;
        }

        let mut payload = &frame.payload[Self::MODE_OFFSET..];
        let verify_mode = payload.get_u8();
        let verify_result = payload.get_u16_le();

        Some(Self {
            verify_mode,
            verify_result,
        })
    }

    /// Only explicit user approval is meaningful
    pub fn is_user_decision(&self) -> bool {
        self.verify_mode == VERIFY_MODE_USER_APPROVAL
    }

    pub fn is_approved(&self) -> bool {
        self.is_user_decision() && self.verify_result == 0
    }
}

/// Payload acknowledging an approved pairing
pub fn approval_ack() -> Bytes {
    let mut buf = BytesMut::with_capacity(9);
    buf.put_u32_le(ACK_MAGIC);
    buf.put_u8(0);
    buf.put_slice(&[0; 4]);
    buf.freeze()
}
