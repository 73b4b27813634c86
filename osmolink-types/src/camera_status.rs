//! Camera status snapshot
//!
//! Decoded from the periodic status broadcast. Every enumerated field is
//! total over its raw byte: values without a known meaning decode to an
//! `Unknown(raw)` variant instead of failing.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{Error, Result};

/// Declares a byte-backed enum with a catch-all `Unknown(u8)` variant
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Raw value with no known meaning
            Unknown(u8),
        }

        impl $name {
            /// Decode a raw byte; unmapped values become `Unknown`
            pub fn from_raw(raw: u8) -> Self {
                match raw {
                    $( $value => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }

            /// Wire value
            pub fn raw(self) -> u8 {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Unknown(raw) => raw,
                }
            }

            pub fn is_known(self) -> bool {
                !matches!(self, Self::Unknown(_))
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                    Self::Unknown(_) => "Unknown",
                }
            }
        }

        impl From<u8> for $name {
            fn from(raw: u8) -> Self {
                Self::from_raw(raw)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.raw()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Unknown(raw) => write!(f, "Unknown(0x{:02X})", raw),
                    _ => f.write_str(self.name()),
                }
            }
        }
    };
}

wire_enum! {
    /// Capture mode
    pub enum CameraMode {
        PanoVideo = 0x38,
        Hyperlapse = 0x3A,
        Selfie = 0x3C,
        PanoPhoto = 0x3F,
        BoostVideo = 0x41,
        Vortex = 0x43,
        PanoSuperNight = 0x44,
        SingleLensSuperNight = 0x4A,
    }
}

wire_enum! {
    /// What the camera screen is showing
    pub enum ViewStatus {
        ScreenOff = 0x00,
        LiveStreaming = 0x01,
        Playback = 0x02,
        PhotoOrRecording = 0x03,
        PreRecording = 0x05,
    }
}

wire_enum! {
    pub enum VideoResolution {
        Standard12Mp = 2,
        Wide20Mp = 3,
        UltraWide30Mp = 4,
        Res1080p = 10,
        Res4k = 16,
        Res2k7 = 45,
        Res1080pPortrait = 66,
        Res2k7FourThree = 95,
        Res4kFourThree = 103,
        Res4kPortrait = 109,
    }
}

wire_enum! {
    /// Frame-rate index
    pub enum FrameRate {
        Fps24 = 1,
        Fps25 = 2,
        Fps30 = 3,
        Fps48 = 4,
        Fps50 = 5,
        Fps60 = 6,
        Fps120 = 7,
        Fps240 = 8,
        Fps100 = 10,
        Fps200 = 19,
    }
}

wire_enum! {
    /// Electronic image stabilization
    pub enum Stabilization {
        Off = 0,
        RockSteady = 1,
        HorizonSteady = 2,
        RockSteadyPlus = 3,
        HorizonBalancing = 4,
    }
}

wire_enum! {
    pub enum PhotoRatio {
        Ratio4x3 = 0,
        Ratio16x9 = 1,
    }
}

wire_enum! {
    /// Active settings preset
    pub enum UserMode {
        General = 0,
        Custom1 = 1,
        Custom2 = 2,
        Custom3 = 3,
        Custom4 = 4,
        Custom5 = 5,
    }
}

wire_enum! {
    pub enum PowerMode {
        Normal = 0,
        Sleep = 3,
    }
}

wire_enum! {
    /// Over-temperature state
    pub enum ThermalState {
        Normal = 0,
        Warning = 1,
        TooHigh = 2,
        Overheat = 3,
    }
}

/// Point-in-time telemetry snapshot
///
/// # Layout
///
/// ```text
/// 0  mode            1  view status     2  resolution      3  fps index
/// 4  stabilization   5  record time u16 7  fov type        8  photo ratio
/// 9  countdown u16   11 tl interval u16 13 tl duration u16
/// 15 capacity u32    19 photos u32      23 time u32        27 reserved
/// 28 user mode       29 power mode      30 thermal         31 photo countdown u32
/// 35 loop record u16 37 battery
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStatus {
    pub camera_mode: CameraMode,
    pub view_status: ViewStatus,
    pub video_resolution: VideoResolution,
    pub frame_rate: FrameRate,
    pub stabilization: Stabilization,

    /// Current recording duration (seconds)
    pub record_time: u16,

    /// Field-of-view type, undocumented
    pub fov_type: u8,

    pub photo_ratio: PhotoRatio,

    pub countdown: u16,
    pub timelapse_interval: u16,
    pub timelapse_duration: u16,

    /// Remaining storage (MB)
    pub remaining_capacity: u32,
    pub remaining_photos: u32,

    /// Remaining recording time (seconds)
    pub remaining_time: u32,

    pub user_mode: UserMode,
    pub power_mode: PowerMode,
    pub thermal_state: ThermalState,

    pub photo_countdown_ms: u32,

    /// Loop recording segment length (seconds)
    pub loop_record_seconds: u16,

    pub battery_percentage: u8,

    /// Payload the snapshot was decoded from
    pub raw: Bytes,
}

impl CameraStatus {
    /// Minimum payload size
    pub const MIN_SIZE: usize = 38;

    /// Decode a status broadcast payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if the payload is shorter than
    /// [`Self::MIN_SIZE`]. Field values never cause an error.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_SIZE {
            return Err(Error::Truncated {
                record: "camera status",
                expected: Self::MIN_SIZE,
                actual: payload.len(),
            });
        }

        let p = payload;
        Ok(Self {
            camera_mode: CameraMode::from_raw(p[0]),
            view_status: ViewStatus::from_raw(p[1]),
            video_resolution: VideoResolution::from_raw(p[2]),
            frame_rate: FrameRate::from_raw(p[3]),
            stabilization: Stabilization::from_raw(p[4]),
            record_time: LittleEndian::read_u16(&p[5..7]),
            fov_type: p[7],
            photo_ratio: PhotoRatio::from_raw(p[8]),
            countdown: LittleEndian::read_u16(&p[9..11]),
            timelapse_interval: LittleEndian::read_u16(&p[11..13]),
            timelapse_duration: LittleEndian::read_u16(&p[13..15]),
            remaining_capacity: LittleEndian::read_u32(&p[15..19]),
            remaining_photos: LittleEndian::read_u32(&p[19..23]),
            remaining_time: LittleEndian::read_u32(&p[23..27]),
            user_mode: UserMode::from_raw(p[28]),
            power_mode: PowerMode::from_raw(p[29]),
            thermal_state: ThermalState::from_raw(p[30]),
            photo_countdown_ms: LittleEndian::read_u32(&p[31..35]),
            loop_record_seconds: LittleEndian::read_u16(&p[35..37]),
            battery_percentage: p[37],
            raw: Bytes::copy_from_slice(payload),
        })
    }

    /// Recording in progress with the counter running
    pub fn is_recording(&self) -> bool {
        self.view_status == ViewStatus::PhotoOrRecording && self.record_time > 0
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CameraStatus[mode={}, view={}, res={}, fps={}, eis={}, battery={}%, thermal={}]",
            self.camera_mode,
            self.view_status,
            self.video_resolution,
            self.frame_rate,
            self.stabilization,
            self.battery_percentage,
            self.thermal_state
        )
    }
}
