//! In-memory transport

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::{NotificationSink, Peripheral, Transport, error::*};

/// One write observed by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub characteristic: String,
    pub data: Bytes,
    pub require_ack: bool,
}

#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    fail_writes: AtomicBool,
    sink: Mutex<Option<NotificationSink>>,
}

impl LinkState {
    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the sink ends the consumer's stream
        self.sink.lock().take();
    }
}

/// Transport half of an in-process link
///
/// Writes are queued to the paired [`MemoryPeer`]; notifications injected by
/// the peer are forwarded to the subscribed sink.
///
/// # Examples
///
/// ```
/// use osmolink_transport::{MemoryTransport, Peripheral, Transport};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut transport, mut peer) =
///     MemoryTransport::new(vec![Peripheral::new("Osmo360-1A2B", "AA:BB:CC:DD:EE:FF")]);
///
/// let found = transport.discover("Osmo360", Duration::ZERO).await.unwrap();
/// transport.connect(&found[0]).await.unwrap();
/// transport.write("fff5", &[0xAA], false).await.unwrap();
///
/// assert_eq!(peer.next_write().await.unwrap().data.as_ref(), &[0xAA]);
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryTransport {
    peripherals: Vec<Peripheral>,
    characteristics: Option<Vec<String>>,
    connected_to: Option<Peripheral>,
    state: Arc<LinkState>,
    writes: mpsc::UnboundedSender<WriteRecord>,
}

impl MemoryTransport {
    /// Create a link advertising `peripherals`, and its peer
    pub fn new(peripherals: Vec<Peripheral>) -> (Self, MemoryPeer) {
        let state = Arc::new(LinkState::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let transport = Self {
            peripherals,
            characteristics: None,
            connected_to: None,
            state: state.clone(),
            writes: tx,
        };
        let peer = MemoryPeer {
            link: PeerLink { state },
            writes: rx,
        };

        (transport, peer)
    }

    /// Restrict writes and subscriptions to the given characteristics
    ///
    /// By default any characteristic is accepted.
    pub fn with_characteristics<I, S>(mut self, characteristics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characteristics = Some(characteristics.into_iter().map(Into::into).collect());
        self
    }

    fn check_characteristic(&self, characteristic: &str) -> Result<()> {
        match &self.characteristics {
            Some(known) if !known.iter().any(|c| c.eq_ignore_ascii_case(characteristic)) => {
                Err(Error::CharacteristicNotFound(characteristic.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn discover(&mut self, name_filter: &str, duration: Duration) -> Result<Vec<Peripheral>> {
        debug!("Scanning for '{}' ({:?})", name_filter, duration);

        let found: Vec<Peripheral> = self
            .peripherals
            .iter()
            .filter(|p| p.name.contains(name_filter))
            .cloned()
            .collect();

        debug!("Found {} peripheral(s)", found.len());
        Ok(found)
    }

    async fn connect(&mut self, peripheral: &Peripheral) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        if !self.peripherals.contains(peripheral) {
            return Err(Error::DeviceNotFound(peripheral.to_string()));
        }

        self.state.connected.store(true, Ordering::SeqCst);
        self.connected_to = Some(peripheral.clone());

        debug!("Connected to {}", peripheral);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(peripheral) = self.connected_to.take() {
            debug!("Disconnecting from {}...", peripheral);
        }
        self.state.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn write(&mut self, characteristic: &str, data: &[u8], require_ack: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.check_characteristic(characteristic)?;

        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::WriteFailed {
                characteristic: characteristic.to_string(),
                reason: "write rejected by peer".into(),
            });
        }

        trace!("Writing {} bytes to {}", data.len(), characteristic);

        self.writes
            .send(WriteRecord {
                characteristic: characteristic.to_string(),
                data: Bytes::copy_from_slice(data),
                require_ack,
            })
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn subscribe(&mut self, characteristic: &str, sink: NotificationSink) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.check_characteristic(characteristic)?;

        *self.state.sink.lock() = Some(sink);
        debug!("Subscribed to {}", characteristic);
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.connected_to
            .as_ref()
            .map(|p| p.address.clone())
            .unwrap_or_else(|| "memory".to_string())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Memory transport dropped while still connected");
        }
        self.state.close();
    }
}

/// Camera side of an in-process link
#[derive(Debug)]
pub struct MemoryPeer {
    link: PeerLink,
    writes: mpsc::UnboundedReceiver<WriteRecord>,
}

impl MemoryPeer {
    /// Wait for the next write; `None` once the transport is gone
    pub async fn next_write(&mut self) -> Option<WriteRecord> {
        self.writes.recv().await
    }

    /// Take a queued write without waiting
    pub fn try_next_write(&mut self) -> Option<WriteRecord> {
        self.writes.try_recv().ok()
    }

    /// Cloneable handle for injecting notifications and steering the link
    pub fn link(&self) -> PeerLink {
        self.link.clone()
    }

    /// Push a notification to the subscribed sink
    pub fn notify(&self, data: impl Into<Bytes>) -> Result<()> {
        self.link.notify(data)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.link.fail_writes(fail);
    }

    /// Drop the link from the camera side
    pub fn close(&self) {
        self.link.close();
    }
}

/// Shared control over the camera side of a link
#[derive(Debug, Clone)]
pub struct PeerLink {
    state: Arc<LinkState>,
}

impl PeerLink {
    /// Push a notification to the subscribed sink
    pub fn notify(&self, data: impl Into<Bytes>) -> Result<()> {
        let guard = self.state.sink.lock();
        let sink = guard.as_ref().ok_or(Error::NotSubscribed)?;
        sink.send(data.into()).map_err(|_| Error::ConnectionClosed)
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.state.close();
    }
}
