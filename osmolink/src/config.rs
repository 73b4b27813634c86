//! Client configuration

use std::time::Duration;

use osmolink_core::constants::{
    self, DEFAULT_APPROVAL_TIMEOUT, DEFAULT_COMMAND_TIMEOUT, DEFAULT_SCAN_DURATION, gatt,
};

/// Environment variable overriding the device name filter
pub const ENV_NAME: &str = "OSMO_NAME";

/// Environment variable overriding the local controller address
pub const ENV_LOCAL_ADDR: &str = "OSMO_LOCAL_ADDR";

/// Camera client configuration
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use osmolink::CameraConfig;
///
/// let config = CameraConfig::default()
///     .with_name_filter("Osmo360-1A2B")
///     .with_command_timeout(Duration::from_secs(2));
/// assert_eq!(config.approval_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Substring matched against advertised peripheral names
    pub name_filter: String,
    /// Local address presented as the client identifier
    pub local_address: String,
    pub scan_duration: Duration,
    pub command_timeout: Duration,
    /// Wait for the user's on-device pairing decision
    pub approval_timeout: Duration,
    pub controller_id: u32,
    pub first_pairing: bool,
    pub write_characteristic: String,
    pub notify_characteristic: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name_filter: "Osmo360".to_string(),
            local_address: "01-02-03-04-05-06".to_string(),
            scan_duration: Duration::from_secs(DEFAULT_SCAN_DURATION),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT),
            approval_timeout: Duration::from_secs(DEFAULT_APPROVAL_TIMEOUT),
            controller_id: constants::pairing::CONTROLLER_ID,
            first_pairing: false,
            write_characteristic: gatt::WRITE_UUID.to_string(),
            notify_characteristic: gatt::NOTIFY_UUID.to_string(),
        }
    }
}

impl CameraConfig {
    /// Defaults, with name filter and local address taken from
    /// `OSMO_NAME` / `OSMO_LOCAL_ADDR` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENV_NAME) {
            config.name_filter = name;
        }
        if let Ok(address) = std::env::var(ENV_LOCAL_ADDR) {
            config.local_address = address;
        }
        config
    }

    pub fn with_name_filter(mut self, name_filter: impl Into<String>) -> Self {
        self.name_filter = name_filter.into();
        self
    }

    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = address.into();
        self
    }

    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set pairing approval timeout
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn with_controller_id(mut self, controller_id: u32) -> Self {
        self.controller_id = controller_id;
        self
    }

    /// Ask the camera to treat this as a first-time pairing
    pub fn with_first_pairing(mut self, first_pairing: bool) -> Self {
        self.first_pairing = first_pairing;
        self
    }

    pub fn with_characteristics(
        mut self,
        write: impl Into<String>,
        notify: impl Into<String>,
    ) -> Self {
        self.write_characteristic = write.into();
        self.notify_characteristic = notify.into();
        self
    }
}
