//! Command identifiers
//!
//! Every frame's data section starts with a `(cmd_set, cmd_id)` pair that
//! selects the operation. [`CommandKey`] is the raw pair as it appears on the
//! wire; [`Command`] names the pairs this client understands.

use std::fmt;

use crate::error::{Error, Result};

/// Raw `(cmd_set, cmd_id)` pair
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub cmd_set: u8,
    pub cmd_id: u8,
}

impl CommandKey {
    pub const fn new(cmd_set: u8, cmd_id: u8) -> Self {
        Self { cmd_set, cmd_id }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}/0x{:02X}", self.cmd_set, self.cmd_id)
    }
}

/// Known protocol commands
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Pairing request (controller to camera) and approval (camera to controller)
    Connection,

    /// GPS location push
    SetLocation,

    /// Periodic camera status broadcast
    CameraStatusPush,

    /// Shutter control: start/stop recording, take photo
    Record,

    /// Switch camera mode
    SetMode,

    /// Start/stop the status broadcast
    StatusSubscription,
}

impl Command {
    /// Wire identifier of this command
    pub const fn key(self) -> CommandKey {
        match self {
            Self::Connection => CommandKey::new(0x00, 0x19),
            Self::SetLocation => CommandKey::new(0x00, 0x17),
            Self::CameraStatusPush => CommandKey::new(0x1D, 0x02),
            Self::Record => CommandKey::new(0x1D, 0x03),
            Self::SetMode => CommandKey::new(0x1D, 0x04),
            Self::StatusSubscription => CommandKey::new(0x1D, 0x05),
        }
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Connection => "CONNECTION",
            Self::SetLocation => "SET_LOCATION",
            Self::CameraStatusPush => "CAMERA_STATUS_PUSH",
            Self::Record => "RECORD",
            Self::SetMode => "SET_MODE",
            Self::StatusSubscription => "STATUS_SUBSCRIPTION",
        }
    }
}

impl From<Command> for CommandKey {
    fn from(cmd: Command) -> CommandKey {
        cmd.key()
    }
}

impl TryFrom<CommandKey> for Command {
    type Error = Error;

    fn try_from(key: CommandKey) -> Result<Self> {
        match (key.cmd_set, key.cmd_id) {
            (0x00, 0x19) => Ok(Self::Connection),
            (0x00, 0x17) => Ok(Self::SetLocation),
            (0x1D, 0x02) => Ok(Self::CameraStatusPush),
            (0x1D, 0x03) => Ok(Self::Record),
            (0x1D, 0x04) => Ok(Self::SetMode),
            (0x1D, 0x05) => Ok(Self::StatusSubscription),
            _ => Err(Error::UnknownCommand(key)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.key())
    }
}
