//! Command channel
//!
//! Encodes outgoing frames, writes them through the transport and waits for
//! the matching response. Exactly one response wait can be outstanding at a
//! time; the channel is borrowed mutably for the whole exchange, so callers
//! are serialized by construction.

use std::sync::Arc;
use std::time::Duration;

use osmolink_core::{AckType, CommandKey, Frame, FrameType, constants::DEFAULT_COMMAND_TIMEOUT};
use osmolink_transport::Transport;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Per-call send options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Wait for a Response frame after writing
    pub expect_response: bool,
    /// Bound on the response wait
    pub timeout: Duration,
    pub frame_type: FrameType,
    pub ack_type: AckType,
    /// Ask the link layer to confirm the write
    pub require_ack: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::command(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT))
    }
}

impl SendOptions {
    /// Command frame awaiting a response for up to `timeout`
    pub fn command(timeout: Duration) -> Self {
        Self {
            expect_response: true,
            timeout,
            frame_type: FrameType::Command,
            ack_type: AckType::Desired,
            require_ack: true,
        }
    }

    /// Response frame answering a camera-initiated command; never waits
    pub fn response() -> Self {
        Self {
            expect_response: false,
            timeout: Duration::ZERO,
            frame_type: FrameType::Response,
            ack_type: AckType::Desired,
            require_ack: true,
        }
    }

    /// Write without waiting for a reply
    pub fn fire_and_forget(mut self) -> Self {
        self.expect_response = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ack_type(mut self, ack_type: AckType) -> Self {
        self.ack_type = ack_type;
        self
    }
}

/// The single pending-response marker
///
/// Armed by the channel before a write and fulfilled by the dispatcher when a
/// Response frame arrives. The channel clears it whenever a send ends, even a
/// cancelled one, so no stale waiter survives into the next exchange.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    pending: Mutex<Option<oneshot::Sender<Frame>>>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next Response frame
    pub fn arm(&self) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().replace(tx).is_some() {
            warn!("Replacing an outstanding response waiter");
        }
        rx
    }

    /// Hand a Response frame to the waiter
    ///
    /// Returns `false` when nobody is waiting; the frame is dropped.
    pub fn fulfil(&self, frame: Frame) -> bool {
        match self.pending.lock().take() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Clear the waiter, if any
    pub fn disarm(&self) {
        self.pending.lock().take();
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

/// Clears the slot when a send returns or its future is dropped
struct Pending<'a>(&'a ResponseSlot);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.disarm();
    }
}

/// Request/response channel over a [`Transport`]
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    responses: Arc<ResponseSlot>,
    write_characteristic: String,
}

impl CommandChannel {
    pub fn new(
        transport: Box<dyn Transport>,
        responses: Arc<ResponseSlot>,
        write_characteristic: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            responses,
            write_characteristic: write_characteristic.into(),
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// Encode and write a frame, then optionally wait for its response
    ///
    /// Returns `Ok(None)` when no response is expected or none arrived within
    /// `options.timeout`; a timeout is not an error and leaves the channel
    /// ready for the next call.
    ///
    /// # Errors
    ///
    /// Fails on encode errors (oversized payload) and on link errors.
    pub async fn send(
        &mut self,
        key: CommandKey,
        payload: &[u8],
        options: SendOptions,
    ) -> Result<Option<Frame>> {
        let frame = Frame::encode(key, payload, options.frame_type, options.ack_type)?;

        // Only commands are answered; acknowledgments must not capture
        // a response meant for someone else
        let waiter = match options.frame_type {
            FrameType::Command => Some(self.responses.arm()),
            FrameType::Response => None,
        };
        let _pending = waiter.is_some().then(|| Pending(&self.responses));

        debug!(
            command = %key,
            frame_type = ?options.frame_type,
            "Sending {} bytes",
            frame.len()
        );

        self.transport
            .write(&self.write_characteristic, &frame, options.require_ack)
            .await?;

        let Some(mut waiter) = waiter else {
            return Ok(None);
        };

        // The reply may already have been routed while the write completed
        if let Ok(reply) = waiter.try_recv() {
            trace!("Immediate response: {}", reply);
            return Ok(Some(reply));
        }

        if !options.expect_response {
            return Ok(None);
        }

        match timeout(options.timeout, waiter).await {
            Ok(Ok(reply)) => {
                debug!("Response: {}", reply);
                Ok(Some(reply))
            }
            Ok(Err(_)) => {
                debug!("Response waiter for {} was cleared", key);
                Ok(None)
            }
            Err(_) => {
                warn!("No response to {} within {:?}", key, options.timeout);
                Ok(None)
            }
        }
    }
}
