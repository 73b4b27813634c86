//! Typed records exchanged with the camera
//!
//! - [`CameraStatus`]: status push decoded from telemetry frames
//! - [`LocationRecord`]: GPS fix sent with the set-location command

pub mod camera_status;
pub mod error;
pub mod location;

pub use camera_status::{
    CameraMode, CameraStatus, FrameRate, PhotoRatio, PowerMode, Stabilization, ThermalState,
    UserMode, VideoResolution, ViewStatus,
};
pub use error::{Error, Result};
pub use location::LocationRecord;
