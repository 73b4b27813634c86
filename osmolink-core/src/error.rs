//! Error types for osmolink-core

use crate::command::CommandKey;

/// Result type alias for osmolink-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an inbound buffer is rejected by the frame decoder.
///
/// A `FrameError` only ever condemns the buffer it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Buffer is shorter than header + trailing checksum
    #[error("Frame too short: expected at least {minimum} bytes, got {actual} bytes")]
    TooShort { minimum: usize, actual: usize },

    /// First byte is not the start-of-frame marker
    #[error("Invalid start of frame: 0x{0:02X}")]
    BadSof(u8),

    /// Ver/Length field disagrees with the buffer length
    #[error("Frame length mismatch: declared {declared} bytes, received {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// Header checksum failed
    #[error("CRC16 mismatch: calculated 0x{calculated:04X}, received 0x{received:04X}")]
    Crc16Mismatch { calculated: u16, received: u16 },

    /// Frame checksum failed
    #[error("CRC32 mismatch: calculated 0x{calculated:08X}, received 0x{received:08X}")]
    Crc32Mismatch { calculated: u32, received: u32 },

    /// Data section cannot hold the command pair
    #[error("Data section too short: {actual} bytes")]
    PayloadTooShort { actual: usize },
}

impl FrameError {
    /// Check if this is one of the two checksum failures
    pub fn is_checksum(&self) -> bool {
        matches!(self, Self::Crc16Mismatch { .. } | Self::Crc32Mismatch { .. })
    }
}

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Inbound frame rejected
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Encoded frame would not fit the 10-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },

    /// Command pair has no known meaning
    #[error("Unknown command: {0}")]
    UnknownCommand(CommandKey),

    /// Handshake phase transition not allowed
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Local address could not be turned into a client identifier
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Payload does not have the layout its command requires
    #[error("Malformed {command} payload: {reason}")]
    MalformedPayload { command: CommandKey, reason: String },
}

impl Error {
    /// Check if error only affects a single inbound buffer
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::MalformedPayload { .. })
    }

    /// Check if the pairing must be restarted
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::InvalidSessionState(_))
    }
}
