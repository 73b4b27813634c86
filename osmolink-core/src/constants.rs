//! Protocol constants

/// Start-of-frame marker
pub const SOF: u8 = 0xAA;

/// Frame format version carried in the Ver/Length field
pub const FRAME_VERSION: u8 = 0;

/// Sequence number written into every outgoing frame.
///
/// The device accepts a constant value; it is not incremented per frame.
pub const FIXED_SEQUENCE: u16 = 0x0001;

/// Default command response timeout (seconds)
pub const DEFAULT_COMMAND_TIMEOUT: u64 = 5;

/// Default wait for the camera's pairing approval (seconds)
pub const DEFAULT_APPROVAL_TIMEOUT: u64 = 10;

/// Default discovery scan duration (seconds)
pub const DEFAULT_SCAN_DURATION: u64 = 2;

/// GATT characteristics used by the camera
pub mod gatt {
    /// Controller writes frames here
    pub const WRITE_UUID: &str = "0000fff5-0000-1000-8000-00805f9b34fb";

    /// Camera notifies frames here
    pub const NOTIFY_UUID: &str = "0000fff4-0000-1000-8000-00805f9b34fb";
}

/// Pairing handshake constants
pub mod pairing {
    /// Identifier this client presents to the camera (GPS remote controller)
    pub const CONTROLLER_ID: u32 = 0x0102_0304;

    /// Protocol version byte of the connection request
    pub const PROTOCOL_VERSION: u8 = 6;

    /// Width of the client identifier field
    pub const CLIENT_ID_LEN: usize = 16;

    /// Verification mode meaning "user approved on the camera"
    pub const VERIFY_MODE_USER_APPROVAL: u8 = 2;

    /// Upper bound (inclusive) of the random verification code
    pub const MAX_VERIFICATION_CODE: u16 = 9999;

    /// Fixed identifier echoed in the pairing acknowledgment
    pub const ACK_MAGIC: u32 = 0x1234_5678;
}

/// Status broadcast subscription constants
pub mod status {
    /// Push frequency byte sent with start/stop requests
    pub const PUSH_FREQUENCY: u8 = 0x14;

    /// Subscription mode: start periodic push
    pub const PUSH_START: u8 = 0x02;

    /// Subscription mode: stop push
    pub const PUSH_STOP: u8 = 0x00;
}

/// Shutter control values for [`Command::Record`](crate::Command::Record)
pub mod record {
    pub const START: u8 = 0x00;
    pub const STOP: u8 = 0x01;
}
