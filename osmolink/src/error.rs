//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

/// Why a connect attempt ended without pairing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// Camera refused the connection request outright
    #[error("Connection request refused (return code {code})")]
    Rejected { code: u8 },

    /// User denied pairing on the camera
    #[error("Pairing denied on camera (result 0x{result:04X})")]
    Denied { result: u16 },

    /// Camera went silent
    #[error("Camera did not answer in time")]
    TimedOut,

    /// Reply could not be interpreted
    #[error("Malformed pairing reply: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] osmolink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] osmolink_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] osmolink_types::Error),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Camera not connected")]
    NotConnected,
}

impl Error {
    /// Check if the session survives this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_recoverable(),
            Self::Types(_) => true,
            _ => false,
        }
    }

    /// Check if a new connect attempt is needed
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Self::Core(e) => e.requires_reconnect(),
            Self::Transport(_) | Self::Handshake(_) | Self::NotConnected => true,
            Self::Types(_) => false,
        }
    }
}
