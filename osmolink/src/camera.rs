//! High-level camera interface

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use osmolink_core::{
    Command, CommandKey, ConnectionSession, Frame, HandshakePhase, constants::record,
};
use osmolink_transport::{self as transport, Transport};
use osmolink_types::{CameraMode, CameraStatus, LocationRecord};

use crate::channel::{CommandChannel, ResponseSlot, SendOptions};
use crate::config::CameraConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::handshake::{self, ApprovalSlot};
use crate::telemetry::{SubscriptionId, TelemetryDecoder};

/// Osmo 360 camera
///
/// Owns the link, the command channel, the inbound dispatcher and the
/// telemetry registry for one camera.
///
/// # Examples
///
/// ```no_run
/// use osmolink::{Camera, CameraConfig, CameraMode};
/// # use osmolink_transport::MemoryTransport;
///
/// # async fn run() -> osmolink::Result<()> {
/// # let (transport, _peer) = MemoryTransport::new(Vec::new());
/// let mut camera = Camera::new(transport, CameraConfig::from_env());
///
/// let device_id = camera.connect().await?;
/// println!("Paired with 0x{:08X}", device_id);
///
/// camera.set_mode(CameraMode::PanoPhoto).await?;
/// camera.take_photo().await?;
///
/// camera.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct Camera {
    config: CameraConfig,
    channel: CommandChannel,
    responses: Arc<ResponseSlot>,
    approvals: Arc<ApprovalSlot>,
    telemetry: Arc<TelemetryDecoder>,
    session: Option<ConnectionSession>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Camera {
    /// Create a camera on top of `transport`
    pub fn new<T>(transport: T, config: CameraConfig) -> Self
    where
        T: Transport + 'static,
    {
        let responses = Arc::new(ResponseSlot::new());
        let channel = CommandChannel::new(
            Box::new(transport),
            responses.clone(),
            config.write_characteristic.clone(),
        );

        Self {
            config,
            channel,
            responses,
            approvals: Arc::new(ApprovalSlot::new()),
            telemetry: Arc::new(TelemetryDecoder::new()),
            session: None,
            dispatcher: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Current handshake phase
    pub fn phase(&self) -> HandshakePhase {
        self.session
            .as_ref()
            .map_or(HandshakePhase::Disconnected, ConnectionSession::phase)
    }

    /// Device id assigned by the camera, once paired
    pub fn device_id(&self) -> Option<u32> {
        match self.phase() {
            HandshakePhase::Paired { device_id } => Some(device_id),
            _ => None,
        }
    }

    /// Check if paired and the link is up
    pub fn is_connected(&self) -> bool {
        self.device_id().is_some() && self.channel.transport().is_connected()
    }

    /// Discover, link and pair
    ///
    /// Returns the device id. A failed attempt leaves the camera
    /// disconnected with [`phase`](Self::phase) showing how it ended; calling
    /// `connect` again starts over.
    ///
    /// # Errors
    ///
    /// - [`transport::Error::DeviceNotFound`] if no peripheral matches the
    ///   name filter
    /// - Link errors from the transport
    /// - [`Error::Handshake`] if the camera refuses, the user denies, or the
    ///   camera goes silent
    pub async fn connect(&mut self) -> Result<u32> {
        if let Some(device_id) = self.device_id() {
            if self.is_connected() {
                debug!("Already paired with 0x{:08X}", device_id);
                return Ok(device_id);
            }
        }

        self.teardown().await;
        let session = self
            .session
            .insert(ConnectionSession::with_random_code(self.config.controller_id));

        match Self::establish(
            &mut self.channel,
            &self.config,
            &self.responses,
            &self.approvals,
            &self.telemetry,
            session,
        )
        .await
        {
            Ok((outcome, dispatcher)) => {
                self.dispatcher = Some(dispatcher);
                match outcome.into_result() {
                    Ok(device_id) => Ok(device_id),
                    Err(e) => {
                        self.teardown().await;
                        Err(e.into())
                    }
                }
            }
            Err(e) => {
                let _ = session.fail();
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn establish(
        channel: &mut CommandChannel,
        config: &CameraConfig,
        responses: &Arc<ResponseSlot>,
        approvals: &Arc<ApprovalSlot>,
        telemetry: &Arc<TelemetryDecoder>,
        session: &mut ConnectionSession,
    ) -> Result<(handshake::HandshakeOutcome, JoinHandle<()>)> {
        let link = channel.transport_mut();

        info!("Scanning for '{}'...", config.name_filter);
        let peripheral = link
            .discover(&config.name_filter, config.scan_duration)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| transport::Error::DeviceNotFound(config.name_filter.clone()))?;

        info!("Connecting to {}...", peripheral);
        link.connect(&peripheral).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        link.subscribe(&config.notify_characteristic, tx).await?;

        let dispatcher =
            Dispatcher::new(responses.clone(), approvals.clone(), telemetry.clone()).spawn(rx);

        session.link_ready()?;
        match handshake::pair(channel, approvals, config, session).await {
            Ok(outcome) => Ok((outcome, dispatcher)),
            Err(e) => {
                dispatcher.abort();
                Err(e)
            }
        }
    }

    /// Disconnect from the camera
    ///
    /// Safe to call at any time, any number of times.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.session.is_some() || self.channel.transport().is_connected() {
            info!("Disconnecting from {}...", self.channel.transport().remote_addr());
        }

        self.teardown().await;
        self.session = None;
        Ok(())
    }

    /// Stop the dispatcher, drop the link and forget per-link state
    async fn teardown(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        if let Err(e) = self.channel.transport_mut().disconnect().await {
            warn!("Failed to close link: {}", e);
        }
        self.responses.disarm();
        self.approvals.disarm();
        self.telemetry.clear();
    }

    fn paired_device(&self) -> Result<u32> {
        if !self.channel.transport().is_connected() {
            return Err(Error::NotConnected);
        }
        self.device_id().ok_or(Error::NotConnected)
    }

    /// Send a command and report whether the camera acknowledged it
    async fn command(&mut self, command: Command, payload: &[u8]) -> Result<bool> {
        let reply = self
            .channel
            .send(
                command.key(),
                payload,
                SendOptions::command(self.config.command_timeout),
            )
            .await?;

        Ok(match reply {
            Some(frame) => {
                if frame.key() != command.key() {
                    debug!("{} answered by {}", command, frame.key());
                }
                frame.payload.first() == Some(&0)
            }
            None => false,
        })
    }

    /// `[device_id][value][0; 4]`
    async fn device_command(&mut self, command: Command, value: u8) -> Result<bool> {
        let device_id = self.paired_device()?;

        let mut payload = BytesMut::with_capacity(9);
        payload.put_u32_le(device_id);
        payload.put_u8(value);
        payload.put_slice(&[0; 4]);

        self.command(command, &payload).await
    }

    /// Switch shooting mode
    ///
    /// Returns `Ok(false)` if the camera refused or did not answer.
    pub async fn set_mode(&mut self, mode: CameraMode) -> Result<bool> {
        info!("Setting mode to {}", mode);
        self.device_command(Command::SetMode, mode.raw()).await
    }

    pub async fn start_recording(&mut self) -> Result<bool> {
        info!("Starting recording");
        self.device_command(Command::Record, record::START).await
    }

    pub async fn stop_recording(&mut self) -> Result<bool> {
        info!("Stopping recording");
        self.device_command(Command::Record, record::STOP).await
    }

    /// Trigger the shutter in a photo mode
    pub async fn take_photo(&mut self) -> Result<bool> {
        info!("Taking photo");
        self.device_command(Command::Record, record::START).await
    }

    /// Push a GPS fix to the camera
    pub async fn set_location(&mut self, location: &LocationRecord) -> Result<bool> {
        self.paired_device()?;
        debug!(
            "Setting location {:.7}, {:.7}",
            location.latitude(),
            location.longitude()
        );
        self.command(Command::SetLocation, &location.encode()).await
    }

    /// Register a status callback
    ///
    /// The first subscriber starts the camera's status broadcast. Callbacks
    /// run on the dispatcher task, in registration order, and must not block.
    pub async fn subscribe_status<F>(&mut self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&CameraStatus) + Send + Sync + 'static,
    {
        self.paired_device()?;
        self.telemetry
            .subscribe(&mut self.channel, callback, self.config.command_timeout)
            .await
    }

    /// Remove a status callback; the last one stops the broadcast
    ///
    /// Returns `false` if `id` was not registered.
    pub async fn unsubscribe_status(&mut self, id: SubscriptionId) -> Result<bool> {
        self.paired_device()?;
        self.telemetry
            .unsubscribe(&mut self.channel, id, self.config.command_timeout)
            .await
    }

    /// Most recent status broadcast, if any arrived on this link
    pub fn latest_status(&self) -> Option<CameraStatus> {
        self.telemetry.latest()
    }

    /// Send an arbitrary frame through the command channel
    pub async fn send_raw(
        &mut self,
        key: CommandKey,
        payload: &[u8],
        options: SendOptions,
    ) -> Result<Option<Frame>> {
        if !self.channel.transport().is_connected() {
            return Err(Error::NotConnected);
        }
        self.channel.send(key, payload, options).await
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}
