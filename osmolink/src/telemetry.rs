//! Status telemetry
//!
//! The camera broadcasts a [`CameraStatus`] while at least one subscriber is
//! registered. Starting and stopping the broadcast is tied to the registry's
//! 0 → 1 and 1 → 0 transitions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use osmolink_core::{Command, Frame, constants::status};
use osmolink_types::CameraStatus;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::channel::{CommandChannel, SendOptions};
use crate::error::Result;

/// Handle returned by [`TelemetryDecoder::subscribe`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type StatusCallback = Arc<dyn Fn(&CameraStatus) + Send + Sync>;

/// Decodes status broadcasts and fans them out to subscribers
#[derive(Default)]
pub struct TelemetryDecoder {
    subscribers: Mutex<Vec<(SubscriptionId, StatusCallback)>>,
    latest: Mutex<Option<CameraStatus>>,
    next_id: AtomicU64,
}

impl fmt::Debug for TelemetryDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryDecoder")
            .field("subscribers", &self.subscriber_count())
            .field("has_status", &self.latest.lock().is_some())
            .finish()
    }
}

/// Subscription command payload: `[mode][frequency][0; 4]`
fn subscription_payload(mode: u8) -> [u8; 6] {
    [mode, status::PUSH_FREQUENCY, 0, 0, 0, 0]
}

impl TelemetryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; the first subscriber starts the broadcast
    ///
    /// # Errors
    ///
    /// A link error while starting the broadcast removes the subscriber
    /// again and is returned.
    pub async fn subscribe<F>(
        &self,
        channel: &mut CommandChannel,
        callback: F,
        timeout: Duration,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&CameraStatus) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let first = {
            let mut subscribers = self.subscribers.lock();
            subscribers.push((id, Arc::new(callback)));
            subscribers.len() == 1
        };
        debug!("Status subscriber {} registered", id);

        if first {
            if let Err(e) = self.request(channel, status::PUSH_START, timeout).await {
                self.subscribers.lock().retain(|(sid, _)| *sid != id);
                return Err(e);
            }
        }

        Ok(id)
    }

    /// Remove a subscriber; the last one stops the broadcast
    ///
    /// Returns `false` if `id` was not registered.
    pub async fn unsubscribe(
        &self,
        channel: &mut CommandChannel,
        id: SubscriptionId,
        timeout: Duration,
    ) -> Result<bool> {
        let now_empty = {
            let mut subscribers = self.subscribers.lock();
            let before = subscribers.len();
            subscribers.retain(|(sid, _)| *sid != id);
            if subscribers.len() == before {
                return Ok(false);
            }
            subscribers.is_empty()
        };
        debug!("Status subscriber {} removed", id);

        if now_empty {
            self.request(channel, status::PUSH_STOP, timeout).await?;
        }

        Ok(true)
    }

    async fn request(&self, channel: &mut CommandChannel, mode: u8, timeout: Duration) -> Result<()> {
        let reply = channel
            .send(
                Command::StatusSubscription.key(),
                &subscription_payload(mode),
                SendOptions::command(timeout),
            )
            .await?;

        let action = if mode == status::PUSH_START { "start" } else { "stop" };
        match reply {
            Some(frame) if frame.payload.first() == Some(&0) => {
                debug!("Status broadcast {} acknowledged", action)
            }
            Some(frame) => warn!("Status broadcast {} refused: {:?}", action, frame.payload),
            None => warn!("Status broadcast {} not acknowledged", action),
        }
        Ok(())
    }

    /// Handle a Command frame from the dispatcher
    ///
    /// Returns `true` if it was a status broadcast that decoded cleanly.
    /// Decode failures are logged and swallowed.
    pub fn on_frame(&self, frame: &Frame) -> bool {
        if !frame.is(Command::CameraStatusPush) {
            debug!("Ignoring notification {}", frame.key());
            return false;
        }

        let status = match CameraStatus::decode(&frame.payload) {
            Ok(status) => status,
            Err(e) => {
                warn!("Dropping status broadcast: {}", e);
                return false;
            }
        };

        *self.latest.lock() = Some(status.clone());

        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<StatusCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(&status);
        }
        true
    }

    /// Most recent decoded status
    pub fn latest(&self) -> Option<CameraStatus> {
        self.latest.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drop every subscriber and the cached status without talking to the
    /// camera
    pub fn clear(&self) {
        self.subscribers.lock().clear();
        self.latest.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ResponseSlot;
    use crate::test_support::{status_frame, status_payload};
    use osmolink_core::{AckType, FrameType};
    use osmolink_transport::{MemoryPeer, MemoryTransport, Peripheral, Transport};
    use osmolink_types::CameraMode;
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_millis(100);

    async fn channel() -> (CommandChannel, MemoryPeer, Arc<ResponseSlot>) {
        let camera = Peripheral::new("Osmo360", "AA:BB:CC:DD:EE:FF");
        let (mut transport, peer) = MemoryTransport::new(vec![camera.clone()]);
        transport.connect(&camera).await.unwrap();
        let slot = Arc::new(ResponseSlot::new());
        let channel = CommandChannel::new(Box::new(transport), slot.clone(), "fff5");
        (channel, peer, slot)
    }

    fn drain(peer: &mut MemoryPeer) -> Vec<Frame> {
        std::iter::from_fn(|| peer.try_next_write())
            .map(|w| Frame::decode(&w.data).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_sent_once() {
        let (mut channel, mut peer, _slot) = channel().await;
        let telemetry = TelemetryDecoder::new();

        let a = telemetry.subscribe(&mut channel, |_| {}, TIMEOUT).await.unwrap();
        let b = telemetry.subscribe(&mut channel, |_| {}, TIMEOUT).await.unwrap();
        assert!(telemetry.unsubscribe(&mut channel, a, TIMEOUT).await.unwrap());
        assert!(telemetry.unsubscribe(&mut channel, b, TIMEOUT).await.unwrap());

        let sent = drain(&mut peer);
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|f| f.is(Command::StatusSubscription)));
        assert_eq!(sent[0].payload.as_ref(), &[0x02, 0x14, 0, 0, 0, 0]);
        assert_eq!(sent[1].payload.as_ref(), &[0x00, 0x14, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id() {
        let (mut channel, mut peer, _slot) = channel().await;
        let telemetry = TelemetryDecoder::new();

        let removed = telemetry
            .unsubscribe(&mut channel, SubscriptionId(42), TIMEOUT)
            .await
            .unwrap();
        assert!(!removed);
        assert!(drain(&mut peer).is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back() {
        let (mut channel, peer, _slot) = channel().await;
        let telemetry = TelemetryDecoder::new();
        peer.fail_writes(true);

        let result = telemetry.subscribe(&mut channel, |_| {}, TIMEOUT).await;
        assert!(result.is_err());
        assert_eq!(telemetry.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_in_registration_order() {
        let (mut channel, _peer, _slot) = channel().await;
        let telemetry = TelemetryDecoder::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            telemetry
                .subscribe(
                    &mut channel,
                    move |status: &CameraStatus| seen.lock().push((tag, status.camera_mode)),
                    TIMEOUT,
                )
                .await
                .unwrap();
        }

        assert!(telemetry.on_frame(&status_frame(&status_payload(0x3F, 80))));

        assert_eq!(
            *seen.lock(),
            vec![
                ("first", CameraMode::PanoPhoto),
                ("second", CameraMode::PanoPhoto),
                ("third", CameraMode::PanoPhoto),
            ]
        );
        assert_eq!(telemetry.latest().unwrap().battery_percentage, 80);
    }

    #[test]
    fn test_corrupt_broadcast_swallowed() {
        let telemetry = TelemetryDecoder::new();

        assert!(!telemetry.on_frame(&status_frame(&[0x38; 10])));
        assert!(telemetry.latest().is_none());

        assert!(telemetry.on_frame(&status_frame(&status_payload(0x38, 55))));
        assert_eq!(telemetry.latest().unwrap().camera_mode, CameraMode::PanoVideo);
    }

    #[test]
    fn test_other_notifications_ignored() {
        let telemetry = TelemetryDecoder::new();
        let encoded = Frame::encode(
            Command::SetMode.key(),
            &status_payload(0x38, 1),
            FrameType::Command,
            AckType::None,
        )
        .unwrap();
        assert!(!telemetry.on_frame(&Frame::decode(&encoded).unwrap()));
        assert!(telemetry.latest().is_none());
    }
}
