//! Inbound frame dispatcher
//!
//! The single consumer of the transport's notification stream. Each buffer
//! is decoded and routed to exactly one destination, in arrival order:
//!
//! - Response frames → the pending [`ResponseSlot`]
//! - Command frames on the connection command, while a handshake is
//!   listening → the [`ApprovalSlot`]
//! - every other Command frame → the [`TelemetryDecoder`]
//!
//! Buffers that fail to decode are logged and dropped; the stream carries on.

use std::sync::Arc;

use bytes::Bytes;
use osmolink_core::{Command, Frame, FrameType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::channel::ResponseSlot;
use crate::handshake::ApprovalSlot;
use crate::telemetry::TelemetryDecoder;

/// Where a decoded frame went
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Route {
    /// Handed to the waiting command
    Response,
    /// Handed to the running handshake
    Handshake,
    /// Handed to the telemetry decoder
    Telemetry,
    /// Response with nobody waiting for it
    Unclaimed,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    responses: Arc<ResponseSlot>,
    approvals: Arc<ApprovalSlot>,
    telemetry: Arc<TelemetryDecoder>,
}

impl Dispatcher {
    pub fn new(
        responses: Arc<ResponseSlot>,
        approvals: Arc<ApprovalSlot>,
        telemetry: Arc<TelemetryDecoder>,
    ) -> Self {
        Self {
            responses,
            approvals,
            telemetry,
        }
    }

    /// Route one decoded frame
    pub fn route(&self, frame: Frame) -> Route {
        match frame.frame_type {
            FrameType::Response => {
                if self.responses.fulfil(frame) {
                    Route::Response
                } else {
                    debug!("Dropping unsolicited response");
                    Route::Unclaimed
                }
            }
            FrameType::Command => {
                let frame = if frame.is(Command::Connection) {
                    match self.approvals.offer(frame) {
                        Ok(()) => return Route::Handshake,
                        Err(frame) => frame,
                    }
                } else {
                    frame
                };
                self.telemetry.on_frame(&frame);
                Route::Telemetry
            }
        }
    }

    /// Decode and route one inbound buffer
    ///
    /// Returns `None` if the buffer was rejected by the decoder.
    pub fn handle(&self, buf: &[u8]) -> Option<Route> {
        match Frame::decode(buf) {
            Ok(frame) => {
                let route = self.route(frame);
                trace!(?route, "Routed {} bytes", buf.len());
                Some(route)
            }
            Err(e) => {
                warn!("Dropping inbound buffer: {} ({})", e, hex::encode(buf));
                None
            }
        }
    }

    /// Consume `inbound` until the link closes it
    pub async fn run(self, mut inbound: mpsc::UnboundedReceiver<Bytes>) {
        while let Some(buf) = inbound.recv().await {
            self.handle(&buf);
        }
        debug!("Notification stream closed");
    }

    /// Run on a new task
    pub fn spawn(self, inbound: mpsc::UnboundedReceiver<Bytes>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbound))
    }
}
