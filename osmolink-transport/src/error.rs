//! Transport errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    #[error("Notifications not subscribed")]
    NotSubscribed,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Write to {characteristic} failed: {reason}")]
    WriteFailed {
        characteristic: String,
        reason: String,
    },
}
