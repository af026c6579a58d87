//! Controller telemetry record.
//!
//! Controllers answer pixel traffic with zero or more fixed 64-byte status
//! records. A record whose size word is below 64 is ignored.

use crate::reader::ByteReader;

/// Wire size of one telemetry record.
pub const TELEMETRY_RECORD_LEN: usize = 64;

/// Status a controller reports about its playback buffer and hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryRecord {
    /// Declared record size
    pub size: u32,
    /// Firmware build number
    pub flash_version: u32,
    /// Controller wall clock, seconds
    pub current_clock: f64,
    /// Timestamp of the oldest buffered frame
    pub oldest_packet: f64,
    /// Timestamp of the newest buffered frame
    pub newest_packet: f64,
    /// Output brightness
    pub brightness: f64,
    /// WiFi RSSI
    pub wifi_signal: f64,
    /// Frame buffer capacity
    pub buffer_size: u32,
    /// Frames currently buffered
    pub buffer_pos: u32,
    /// Frames drawn per second
    pub fps_drawing: u32,
    /// Estimated power draw
    pub watts: u32,
}

impl TelemetryRecord {
    /// Parse the record at the start of `bytes`.
    ///
    /// Returns `None` if fewer than 64 bytes are present or the declared
    /// size is too small.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let mut r = ByteReader::new(bytes.get(..TELEMETRY_RECORD_LEN)?);
        let record = Self {
            size: r.read_u32_le().ok()?,
            flash_version: r.read_u32_le().ok()?,
            current_clock: r.read_f64_le().ok()?,
            oldest_packet: r.read_f64_le().ok()?,
            newest_packet: r.read_f64_le().ok()?,
            brightness: r.read_f64_le().ok()?,
            wifi_signal: r.read_f64_le().ok()?,
            buffer_size: r.read_u32_le().ok()?,
            buffer_pos: r.read_u32_le().ok()?,
            fps_drawing: r.read_u32_le().ok()?,
            watts: r.read_u32_le().ok()?,
        };
        (record.size as usize >= TELEMETRY_RECORD_LEN).then_some(record)
    }

    /// Serialize the record; used by fake controllers in tests and tools.
    pub fn to_bytes(&self) -> [u8; TELEMETRY_RECORD_LEN] {
        let mut out = Vec::with_capacity(TELEMETRY_RECORD_LEN);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.flash_version.to_le_bytes());
        for value in [
            self.current_clock,
            self.oldest_packet,
            self.newest_packet,
            self.brightness,
            self.wifi_signal,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for value in [self.buffer_size, self.buffer_pos, self.fps_drawing, self.watts] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        let mut record = [0u8; TELEMETRY_RECORD_LEN];
        record.copy_from_slice(&out);
        record
    }

    /// How far the newest buffered frame sits ahead of the controller clock.
    pub fn clock_skew(&self) -> f64 {
        self.newest_packet - self.current_clock
    }

    /// Firmware version as displayed to operators.
    pub fn firmware_version(&self) -> String {
        format!("v{}", self.flash_version)
    }
}
