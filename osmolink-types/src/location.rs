//! GPS location record pushed to the camera

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{Error, Result};

/// Fixed-layout location fix
///
/// # Layout (48 bytes, little-endian)
///
/// ```text
/// 0  date i32 (yyyymmdd)     4  time i32 (hhmmss)
/// 8  longitude i32 (1e-7°)   12 latitude i32 (1e-7°)   16 altitude i32 (mm)
/// 20 v_north f32 (cm/s)      24 v_east f32             28 v_down f32
/// 32 vertical acc u32 (mm)   36 horizontal acc u32     40 speed acc u32
/// 44 satellites u32
/// ```
///
/// Date and time are written in UTC+8, the camera's clock convention.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use osmolink_types::LocationRecord;
///
/// let record = LocationRecord::new(Utc::now())
///     .with_position(46.9480, 7.4474)
///     .unwrap()
///     .with_altitude(540.0)
///     .with_satellites(9);
/// assert_eq!(record.encode().len(), LocationRecord::SIZE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRecord {
    pub date: i32,
    pub time: i32,
    longitude: i32,
    latitude: i32,
    pub altitude_mm: i32,
    pub velocity_north: f32,
    pub velocity_east: f32,
    pub velocity_down: f32,
    pub vertical_accuracy_mm: u32,
    pub horizontal_accuracy_mm: u32,
    pub speed_accuracy_mm: u32,
    pub satellites: u32,
}

impl LocationRecord {
    pub const SIZE: usize = 48;

    const COORD_SCALE: f64 = 1e7;
    const CAMERA_UTC_OFFSET_HOURS: i64 = 8;

    /// Record at `timestamp` with a zero position
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            date: 0,
            time: 0,
            longitude: 0,
            latitude: 0,
            altitude_mm: 0,
            velocity_north: 0.0,
            velocity_east: 0.0,
            velocity_down: 0.0,
            vertical_accuracy_mm: 0,
            horizontal_accuracy_mm: 0,
            speed_accuracy_mm: 0,
            satellites: 0,
        }
        .with_timestamp(timestamp)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        let camera_time =
            timestamp.naive_utc() + Duration::hours(Self::CAMERA_UTC_OFFSET_HOURS);
        self.date = camera_time.year() * 10_000
            + camera_time.month() as i32 * 100
            + camera_time.day() as i32;
        self.time = camera_time.hour() as i32 * 10_000
            + camera_time.minute() as i32 * 100
            + camera_time.second() as i32;
        self
    }

    /// Set position in decimal degrees
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for non-finite or out-of-range values.
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::Validation(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Validation(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }

        self.latitude = (latitude * Self::COORD_SCALE).round() as i32;
        self.longitude = (longitude * Self::COORD_SCALE).round() as i32;
        Ok(self)
    }

    /// Set altitude in metres
    pub fn with_altitude(mut self, metres: f64) -> Self {
        self.altitude_mm = (metres * 1000.0).round() as i32;
        self
    }

    /// Set velocity components in cm/s
    pub fn with_velocity(mut self, north: f32, east: f32, down: f32) -> Self {
        self.velocity_north = north;
        self.velocity_east = east;
        self.velocity_down = down;
        self
    }

    /// Set accuracy estimates in mm
    pub fn with_accuracy(mut self, vertical: u32, horizontal: u32, speed: u32) -> Self {
        self.vertical_accuracy_mm = vertical;
        self.horizontal_accuracy_mm = horizontal;
        self.speed_accuracy_mm = speed;
        self
    }

    pub fn with_satellites(mut self, satellites: u32) -> Self {
        self.satellites = satellites;
        self
    }

    /// Latitude in decimal degrees
    pub fn latitude(&self) -> f64 {
        self.latitude as f64 / Self::COORD_SCALE
    }

    /// Longitude in decimal degrees
    pub fn longitude(&self) -> f64 {
        self.longitude as f64 / Self::COORD_SCALE
    }

    /// Encode to the 48-byte wire layout
    pub fn encode(&self) -> Bytes {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_i32(&mut buf[0..4], self.date);
        LittleEndian::write_i32(&mut buf[4..8], self.time);
        LittleEndian::write_i32(&mut buf[8..12], self.longitude);
        LittleEndian::write_i32(&mut buf[12..16], self.latitude);
        LittleEndian::write_i32(&mut buf[16..20], self.altitude_mm);
        LittleEndian::write_f32(&mut buf[20..24], self.velocity_north);
        LittleEndian::write_f32(&mut buf[24..28], self.velocity_east);
        LittleEndian::write_f32(&mut buf[28..32], self.velocity_down);
        LittleEndian::write_u32(&mut buf[32..36], self.vertical_accuracy_mm);
        LittleEndian::write_u32(&mut buf[36..40], self.horizontal_accuracy_mm);
        LittleEndian::write_u32(&mut buf[40..44], self.speed_accuracy_mm);
        LittleEndian::write_u32(&mut buf[44..48], self.satellites);
        Bytes::copy_from_slice(&buf)
    }
}
