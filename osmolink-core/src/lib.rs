//! # osmolink-core
//!
//! Core protocol implementation for Osmo 360 cameras.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC16/CRC32 checksums
//! - Command identifiers
//! - Pairing payloads and session phases
//! - Protocol constants

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod pairing;
pub mod session;

pub use command::{Command, CommandKey};
pub use error::{Error, FrameError, Result};
pub use frame::{AckType, Frame, FrameType};
pub use session::{ConnectionSession, HandshakePhase};
