//! # osmolink
//!
//! Client for the Osmo 360 camera's binary frame protocol.
//!
//! ## Features
//!
//! - Checksummed frame codec with typed decode errors
//! - Pairing handshake with on-camera approval
//! - Camera control: mode, shutter, GPS location
//! - Status telemetry with subscriber fan-out
//! - Async/await API using Tokio, over any [`Transport`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use osmolink::{Camera, CameraConfig, CameraMode};
//! # use osmolink_transport::MemoryTransport;
//!
//! #[tokio::main]
//! async fn main() -> osmolink::Result<()> {
//!     # let (transport, _peer) = MemoryTransport::new(Vec::new());
//!     let mut camera = Camera::new(transport, CameraConfig::default());
//!
//!     // Pair (the user confirms on the camera)
//!     let device_id = camera.connect().await?;
//!     println!("Paired with 0x{:08X}", device_id);
//!
//!     camera.set_mode(CameraMode::PanoPhoto).await?;
//!     camera.take_photo().await?;
//!
//!     camera.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod telemetry;

#[cfg(test)]
mod test_support;

// Re-exports
pub use camera::Camera;
pub use channel::{CommandChannel, ResponseSlot, SendOptions};
pub use config::CameraConfig;
pub use dispatch::{Dispatcher, Route};
pub use error::{Error, HandshakeError, Result};
pub use handshake::{ApprovalSlot, HandshakeOutcome, Rejection};
pub use telemetry::{SubscriptionId, TelemetryDecoder};

// Re-export protocol and record types
pub use osmolink_core::{Command, CommandKey, Frame, FrameType, HandshakePhase};
pub use osmolink_transport::{MemoryTransport, Peripheral, Transport};
pub use osmolink_types::{CameraMode, CameraStatus, LocationRecord};
