//! Pair with a simulated camera, take a panorama photo and print its status
//!
//! Runs against an in-process camera so it works without hardware:
//!
//! ```text
//! RUST_LOG=osmolink=debug cargo run --example simulated_camera
//! ```

use std::time::Duration;

use osmolink::{Camera, CameraConfig, CameraMode, Command, FrameType, MemoryTransport, Peripheral};
use osmolink_core::{AckType, Frame, constants::status};
use osmolink_transport::MemoryPeer;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const DEVICE_ID: u32 = 0x0036_0001;

/// Minimal camera: approves pairing, acknowledges every command and pushes
/// one status broadcast when the broadcast is started
async fn run_camera(mut peer: MemoryPeer) {
    let mut mode = CameraMode::PanoVideo.raw();

    while let Some(write) = peer.next_write().await {
        let Ok(frame) = Frame::decode(&write.data) else {
            continue;
        };
        if frame.is_response() {
            continue;
        }

        let reply = |payload: &[u8], frame_type| {
            let encoded = Frame::encode(frame.key(), payload, frame_type, AckType::Desired)
                .expect("payload fits");
            let _ = peer.notify(encoded.freeze());
        };

        match frame.command() {
            Some(Command::Connection) => {
                let mut accept = DEVICE_ID.to_le_bytes().to_vec();
                accept.extend_from_slice(&[0; 5]);
                reply(&accept, FrameType::Response);

                // User taps "allow" on the camera
                let mut approval = vec![0u8; 33];
                approval[26] = 2;
                reply(&approval, FrameType::Command);
            }
            Some(Command::SetMode) => {
                mode = frame.payload[4];
                reply(&[0], FrameType::Response);
            }
            Some(Command::StatusSubscription) => {
                reply(&[0], FrameType::Response);
                if frame.payload[0] == status::PUSH_START {
                    let mut payload = vec![0u8; 38];
                    payload[0] = mode;
                    payload[2] = 16; // 4K
                    payload[3] = 3; // 30 fps
                    payload[19..23].copy_from_slice(&1520u32.to_le_bytes());
                    payload[37] = 87;
                    let push = Frame::encode(
                        Command::CameraStatusPush.key(),
                        &payload,
                        FrameType::Command,
                        AckType::None,
                    )
                    .expect("payload fits");
                    let _ = peer.notify(push.freeze());
                }
            }
            _ => reply(&[0], FrameType::Response),
        }
    }
}

#[tokio::main]
async fn main() -> osmolink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CameraConfig::from_env().with_approval_timeout(Duration::from_secs(10));

    let (transport, peer) = MemoryTransport::new(vec![Peripheral::new(
        format!("{}-SIM", config.name_filter),
        "AA:BB:CC:DD:EE:FF",
    )]);
    tokio::spawn(run_camera(peer));

    let mut camera = Camera::new(transport, config);

    let device_id = camera.connect().await?;
    println!("Connected to camera 0x{:08X}", device_id);

    if camera.set_mode(CameraMode::PanoPhoto).await? {
        println!("Switched to {}", CameraMode::PanoPhoto);
    }

    if camera.take_photo().await? {
        println!("Photo taken");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = camera
        .subscribe_status(move |status| {
            let _ = tx.send(status.clone());
        })
        .await?;

    if let Ok(Some(status)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        println!("{} (recording: {})", status, status.is_recording());
    }

    camera.unsubscribe_status(subscription).await?;
    camera.disconnect().await?;

    Ok(())
}
