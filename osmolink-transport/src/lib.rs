//! Transport layer for the camera link
//!
//! The protocol engine talks to the camera through a characteristic-oriented
//! link: it discovers a peripheral, connects, writes to one characteristic
//! and receives notifications from another. [`Transport`] abstracts that
//! link; [`MemoryTransport`] is an in-process implementation with a scriptable
//! peer.

pub mod error;
pub mod memory;

pub use error::{Error, Result};
pub use memory::{MemoryPeer, MemoryTransport, PeerLink, WriteRecord};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Receiving end for inbound notifications
///
/// Every notification is delivered as one buffer, in arrival order.
pub type NotificationSink = mpsc::UnboundedSender<Bytes>;

/// Discovered device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peripheral {
    /// Advertised name
    pub name: String,
    /// Link-layer address
    pub address: String,
}

impl Peripheral {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.address)
    }
}

/// Transport trait for characteristic-oriented links
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan for `duration` and return peripherals whose name contains
    /// `name_filter`
    async fn discover(&mut self, name_filter: &str, duration: Duration) -> Result<Vec<Peripheral>>;

    /// Connect to a discovered peripheral
    async fn connect(&mut self, peripheral: &Peripheral) -> Result<()>;

    /// Disconnect; a no-op when not connected
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Write raw bytes to a characteristic
    async fn write(&mut self, characteristic: &str, data: &[u8], require_ack: bool) -> Result<()>;

    /// Forward notifications from a characteristic into `sink`
    async fn subscribe(&mut self, characteristic: &str, sink: NotificationSink) -> Result<()>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
