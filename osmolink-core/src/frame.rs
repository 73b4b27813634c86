//! Wire frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use tracing::trace;

use crate::{
    checksum,
    command::{Command, CommandKey},
    constants::{FIXED_SEQUENCE, FRAME_VERSION, SOF},
    error::{Error, FrameError, Result},
};

/// Whether a frame initiates an exchange or answers one
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameType {
    Command,
    Response,
}

impl FrameType {
    const BIT: u8 = 0x20;

    fn from_cmd_type(cmd_type: u8) -> Self {
        if cmd_type & Self::BIT != 0 {
            Self::Response
        } else {
            Self::Command
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Command => 0,
            Self::Response => Self::BIT,
        }
    }
}

/// Requested acknowledgment strength (bits 4:0 of CmdType)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AckType {
    /// No acknowledgment expected
    None,
    /// Acknowledgment desired but optional
    Desired,
    /// Acknowledgment mandatory; raw values 2..=31
    ///
    /// Only the low 5 bits go on the wire and levels below 2 are raised to 2,
    /// so out-of-range levels do not survive a round trip.
    Required(u8),
}

impl AckType {
    const MASK: u8 = 0x1F;

    /// Lowest mandatory acknowledgment level
    pub const fn required() -> Self {
        Self::Required(2)
    }

    /// Decode the 5-bit field; every value maps to a variant
    pub fn from_bits(bits: u8) -> Self {
        match bits & Self::MASK {
            0 => Self::None,
            1 => Self::Desired,
            n => Self::Required(n),
        }
    }

    /// 5-bit wire value
    pub fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Desired => 1,
            Self::Required(n) => (n & Self::MASK).max(2),
        }
    }
}

/// Decoded protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────┬────────────┬─────────┬─────┬──────────┬───────┬────────┬──────────────────────────┬────────┐
/// │ SOF │ Ver/Length │ CmdType │ ENC │ Reserved │  SEQ  │ CRC16  │ DATA                     │ CRC32  │
/// │ 0xAA│  2 bytes   │ 1 byte  │  1  │ 3 bytes  │ 2 (LE)│ 2 (LE) │ [cmd_set][cmd_id][payload]│ 4 (LE) │
/// └─────┴────────────┴─────────┴─────┴──────────┴───────┴────────┴──────────────────────────┴────────┘
/// ```
///
/// Ver/Length packs the version in bits 15:10 and the total frame length in
/// bits 9:0. CRC16 covers bytes 0..10, CRC32 covers everything before it.
///
/// # Examples
///
/// ```
/// use osmolink_core::{AckType, Command, Frame, FrameType};
///
/// let encoded = Frame::encode(
///     Command::SetMode.into(),
///     &[1, 2, 3, 4, 5],
///     FrameType::Command,
///     AckType::Desired,
/// )
/// .unwrap();
/// assert_eq!(encoded.len(), 23);
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(decoded.command(), Some(Command::SetMode));
/// assert_eq!(decoded.payload.as_ref(), &[1, 2, 3, 4, 5]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Format version (6 bits)
    pub version: u8,

    /// Total frame length from the Ver/Length field (10 bits)
    pub length: u16,

    pub frame_type: FrameType,

    pub ack_type: AckType,

    /// Encryption byte (reserved)
    pub enc: u8,

    /// Sequence number
    pub seq: u16,

    pub crc16: u16,

    pub cmd_set: u8,

    pub cmd_id: u8,

    /// Command-specific data following the command pair
    pub payload: Bytes,

    pub crc32: u32,
}

impl Frame {
    /// Bytes from SOF through CRC16
    pub const HEADER_SIZE: usize = 12;

    /// Bytes covered by CRC16
    pub const CRC16_SPAN: usize = 10;

    /// Trailing CRC32 size
    pub const FOOTER_SIZE: usize = 4;

    /// Smallest buffer worth inspecting
    pub const MIN_SIZE: usize = Self::HEADER_SIZE + Self::FOOTER_SIZE;

    /// Largest length the 10-bit field can express
    pub const MAX_SIZE: usize = 0x03FF;

    /// Largest payload after the command pair
    pub const MAX_PAYLOAD_SIZE: usize = Self::MAX_SIZE - Self::MIN_SIZE - 2;

    /// Encode a frame to bytes
    ///
    /// The sequence number is always [`FIXED_SEQUENCE`] and ENC is zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the frame would not fit the
    /// 10-bit length field.
    pub fn encode(
        key: CommandKey,
        payload: &[u8],
        frame_type: FrameType,
        ack_type: AckType,
    ) -> Result<BytesMut> {
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }

        let total_size = Self::MIN_SIZE + 2 + payload.len();
        let ver_length = ((FRAME_VERSION as u16) << 10) | (total_size as u16 & 0x03FF);

        let mut buf = BytesMut::with_capacity(total_size);

        buf.put_u8(SOF);
        buf.put_u16_le(ver_length);
        buf.put_u8(ack_type.bits() | frame_type.bits());
        buf.put_u8(0); // ENC
        buf.put_slice(&[0, 0, 0]);
        buf.put_u16_le(FIXED_SEQUENCE);

        let crc16 = checksum::header_crc(&buf[..Self::CRC16_SPAN]);
        buf.put_u16_le(crc16);

        buf.put_u8(key.cmd_set);
        buf.put_u8(key.cmd_id);
        buf.put_slice(payload);

        let crc32 = checksum::frame_crc(&buf);
        buf.put_u32_le(crc32);

        trace!(
            command = %key,
            ?frame_type,
            len = total_size,
            "Encoded frame: {}",
            hex::encode(&buf)
        );

        Ok(buf)
    }

    /// Decode a frame from one complete inbound buffer
    ///
    /// Nothing is returned unless every check passes; a rejected buffer is
    /// never partially decoded.
    ///
    /// # Errors
    ///
    /// Checks run in wire order: minimum size, SOF, declared length, CRC16,
    /// CRC32, then the data section's command pair.
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, FrameError> {
        if buf.len() < Self::MIN_SIZE {
            return Err(FrameError::TooShort {
                minimum: Self::MIN_SIZE,
                actual: buf.len(),
            });
        }

        let mut header = &buf[..Self::HEADER_SIZE];

        let sof = header.get_u8();
        if sof != SOF {
            return Err(FrameError::BadSof(sof));
        }

        let ver_length = header.get_u16_le();
        let version = (ver_length >> 10) as u8 & 0x3F;
        let length = ver_length & 0x03FF;

        if length as usize != buf.len() {
            return Err(FrameError::LengthMismatch {
                declared: length as usize,
                actual: buf.len(),
            });
        }

        let cmd_type = header.get_u8();
        let enc = header.get_u8();
        header.advance(3);
        let seq = header.get_u16_le();
        let crc16 = header.get_u16_le();

        let calculated = checksum::header_crc(&buf[..Self::CRC16_SPAN]);
        if calculated != crc16 {
            return Err(FrameError::Crc16Mismatch {
                calculated,
                received: crc16,
            });
        }

        let data_end = buf.len() - Self::FOOTER_SIZE;
        let mut footer = &buf[data_end..];
        let crc32 = footer.get_u32_le();

        let calculated = checksum::frame_crc(&buf[..data_end]);
        if calculated != crc32 {
            return Err(FrameError::Crc32Mismatch {
                calculated,
                received: crc32,
            });
        }

        let data = &buf[Self::HEADER_SIZE..data_end];
        if data.len() < 2 {
            return Err(FrameError::PayloadTooShort { actual: data.len() });
        }

        let frame = Self {
            version,
            length,
            frame_type: FrameType::from_cmd_type(cmd_type),
            ack_type: AckType::from_bits(cmd_type),
            enc,
            seq,
            crc16,
            cmd_set: data[0],
            cmd_id: data[1],
            payload: Bytes::copy_from_slice(&data[2..]),
            crc32,
        };

        trace!("Decoded: {:?}", frame);

        Ok(frame)
    }

    /// Raw command pair
    pub fn key(&self) -> CommandKey {
        CommandKey::new(self.cmd_set, self.cmd_id)
    }

    /// Named command, if the pair is known
    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.key()).ok()
    }

    /// Check if this frame carries the given command
    pub fn is(&self, command: Command) -> bool {
        self.key() == command.key()
    }

    pub fn is_response(&self) -> bool {
        self.frame_type == FrameType::Response
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        Self::MIN_SIZE + 2 + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &self.key().to_string())
            .field("frame_type", &self.frame_type)
            .field("ack_type", &self.ack_type)
            .field("seq", &format!("0x{:04X}", self.seq))
            .field("crc16", &format!("0x{:04X}", self.crc16))
            .field("crc32", &format!("0x{:08X}", self.crc32))
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}]({:?}, seq={}, len={})",
            self.key(),
            self.frame_type,
            self.seq,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SET_MODE_FRAME: [u8; 23] = [
        0xAA, 0x17, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x2E, 0x1D, 0x04, 0x01,
        0x02, 0x03, 0x04, 0x05, 0xC2, 0x05, 0x05, 0xEF,
    ];

    fn encode_command(payload: &[u8]) -> BytesMut {
        Frame::encode(
            Command::SetMode.key(),
            payload,
            FrameType::Command,
            AckType::Desired,
        )
        .unwrap()
    }

    #[test]
    fn test_encode_known_frame() {
        let encoded = encode_command(&[1, 2, 3, 4, 5]);

        assert_eq!(encoded.len(), 12 + 2 + 5 + 4);
        assert_eq!(encoded[0], 0xAA);
        assert_eq!(u16::from_le_bytes([encoded[1], encoded[2]]) & 0x03FF, 23);
        assert_eq!(encoded.as_ref(), &SET_MODE_FRAME[..]);
    }

    #[test]
    fn test_encode_response_ack() {
        let payload = [0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00];
        let encoded = Frame::encode(
            Command::Connection.key(),
            &payload,
            FrameType::Response,
            AckType::Desired,
        )
        .unwrap();

        let expected = [
            0xAA, 0x1B, 0x00, 0x21, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x74, 0xEC, 0x00, 0x19,
            0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x50, 0xA4, 0x74, 0xE4,
        ];
        assert_eq!(encoded.as_ref(), &expected[..]);
    }

    #[test]
    fn test_decode_known_frame() {
        let frame = Frame::decode(&SET_MODE_FRAME).unwrap();

        assert_eq!(frame.version, 0);
        assert_eq!(frame.length, 23);
        assert_eq!(frame.frame_type, FrameType::Command);
        assert_eq!(frame.ack_type, AckType::Desired);
        assert_eq!(frame.enc, 0);
        assert_eq!(frame.seq, FIXED_SEQUENCE);
        assert_eq!(frame.crc16, 0x2E00);
        assert_eq!(frame.crc32, 0xEF05_05C2);
        assert_eq!(frame.key(), CommandKey::new(0x1D, 0x04));
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3, 4, 5]);
        assert_eq!(frame.size(), 23);
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode_command(&[9, 8, 7]), encode_command(&[9, 8, 7]));
    }

    #[test]
    fn test_decode_too_short() {
        let result = Frame::decode(&SET_MODE_FRAME[..15]);
        assert_eq!(
            result,
            Err(FrameError::TooShort {
                minimum: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_decode_bad_sof() {
        let mut buf = SET_MODE_FRAME;
        buf[0] = 0x55;
        assert_eq!(Frame::decode(&buf), Err(FrameError::BadSof(0x55)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut buf = SET_MODE_FRAME.to_vec();
        buf.push(0x00);
        assert_eq!(
            Frame::decode(&buf),
            Err(FrameError::LengthMismatch {
                declared: 23,
                actual: 24
            })
        );
    }

    #[test]
    fn test_decode_crc16_mismatch() {
        let mut buf = SET_MODE_FRAME;
        buf[10] ^= 0xFF;
        assert!(matches!(
            Frame::decode(&buf),
            Err(FrameError::Crc16Mismatch { received: 0x2EFF, .. })
        ));
    }

    #[test]
    fn test_decode_crc32_mismatch() {
        let mut buf = SET_MODE_FRAME;
        buf[14] ^= 0x01;
        assert!(matches!(
            Frame::decode(&buf),
            Err(FrameError::Crc32Mismatch { .. })
        ));
    }

    #[test]
    fn test_decode_empty_data_section() {
        // Valid checksums around a data section without a command pair
        let mut buf = vec![0xAA, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
        let crc16 = checksum::header_crc(&buf);
        buf.extend_from_slice(&crc16.to_le_bytes());
        let crc32 = checksum::frame_crc(&buf);
        buf.extend_from_slice(&crc32.to_le_bytes());

        assert_eq!(
            Frame::decode(&buf),
            Err(FrameError::PayloadTooShort { actual: 0 })
        );
    }

    #[test]
    fn test_empty_payload() {
        let encoded = encode_command(&[]);
        assert_eq!(encoded.len(), Frame::MIN_SIZE + 2);

        let decoded = Frame::decode(&encoded).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; Frame::MAX_PAYLOAD_SIZE + 1];
        let result = Frame::encode(
            Command::SetLocation.key(),
            &payload,
            FrameType::Command,
            AckType::Desired,
        );
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_largest_payload_fits() {
        let payload = vec![0xAB; Frame::MAX_PAYLOAD_SIZE];
        let encoded = Frame::encode(
            Command::SetLocation.key(),
            &payload,
            FrameType::Command,
            AckType::Desired,
        )
        .unwrap();

        assert_eq!(encoded.len(), Frame::MAX_SIZE);
        assert_eq!(Frame::decode(&encoded).unwrap().payload.len(), payload.len());
    }

    #[test]
    fn test_cmd_type_bits() {
        let encoded = Frame::encode(
            Command::Connection.key(),
            &[],
            FrameType::Response,
            AckType::required(),
        )
        .unwrap();

        assert_eq!(encoded[3], 0x22);
        let frame = Frame::decode(&encoded).unwrap();
        assert!(frame.is_response());
        assert_eq!(frame.ack_type, AckType::Required(2));
    }

    #[test]
    fn test_ack_type_from_bits_is_total() {
        for bits in 0..=u8::MAX {
            let ack = AckType::from_bits(bits);
            assert_eq!(ack.bits(), bits & 0x1F);
        }
    }

    #[test]
    fn test_required_level_is_masked() {
        assert_eq!(AckType::Required(40).bits(), 8);
        assert_eq!(AckType::Required(0).bits(), 2);
        assert_eq!(AckType::from_bits(AckType::Required(31).bits()), AckType::Required(31));
        assert_eq!(AckType::from_bits(AckType::Required(40).bits()), AckType::Required(8));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            cmd_set in any::<u8>(),
            cmd_id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=256),
            is_response in any::<bool>(),
            ack_bits in 0u8..32,
        ) {
            let frame_type = if is_response { FrameType::Response } else { FrameType::Command };
            let ack_type = AckType::from_bits(ack_bits);
            let encoded = Frame::encode(CommandKey::new(cmd_set, cmd_id), &payload, frame_type, ack_type).unwrap();

            let decoded = Frame::decode(&encoded).unwrap();
            prop_assert_eq!(decoded.cmd_set, cmd_set);
            prop_assert_eq!(decoded.cmd_id, cmd_id);
            prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
            prop_assert_eq!(decoded.frame_type, frame_type);
            prop_assert_eq!(decoded.ack_type, ack_type);
            prop_assert_eq!(decoded.length as usize, encoded.len());
        }

        #[test]
        fn prop_single_byte_tamper_never_decodes(
            payload in proptest::collection::vec(any::<u8>(), 0..=64),
            index in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let mut encoded = encode_command(&payload).to_vec();
            let i = index.index(encoded.len());
            encoded[i] ^= mask;

            let result = Frame::decode(&encoded);
            prop_assert!(result.is_err());
            if i >= 3 {
                prop_assert!(result.unwrap_err().is_checksum());
            }
        }

        #[test]
        fn prop_length_mismatch_rejected(
            payload in proptest::collection::vec(any::<u8>(), 0..=64),
            extra in proptest::collection::vec(any::<u8>(), 1..=16),
            cut in 1usize..=6,
        ) {
            let encoded = encode_command(&payload).to_vec();

            let mut longer = encoded.clone();
            longer.extend_from_slice(&extra);
            let is_length_mismatch = matches!(
                Frame::decode(&longer),
                Err(FrameError::LengthMismatch { .. })
            );
            prop_assert!(is_length_mismatch);

            let shorter = &encoded[..encoded.len() - cut];
            let rejected = matches!(
                Frame::decode(shorter),
                Err(FrameError::LengthMismatch { .. }) | Err(FrameError::TooShort { .. })
            );
            prop_assert!(rejected);
        }
    }
}
