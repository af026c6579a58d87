//! Playback timestamp helpers.

use std::time::Duration;

/// Share of the controller's frame buffer the server aims to keep filled.
pub const BUFFER_FILL_RATIO: f64 = 0.70;

/// Lead time used when the site frame rate is unknown.
pub const DEFAULT_PLAYBACK_OFFSET: Duration = Duration::from_secs(1);

/// How far past render time a frame should be played back.
///
/// `frames_per_buffer * 0.70 / site_fps` seconds, or one second when the
/// site frame rate is zero.
pub fn playback_offset(frames_per_buffer: u32, site_fps: u32) -> Duration {
    if site_fps == 0 {
        return DEFAULT_PLAYBACK_OFFSET;
    }
    Duration::from_secs_f64(f64::from(frames_per_buffer) * BUFFER_FILL_RATIO / f64::from(site_fps))
}

/// Split a timestamp into whole seconds and the microsecond remainder.
pub fn split_timestamp(timestamp: Duration) -> (u64, u64) {
    (timestamp.as_secs(), u64::from(timestamp.subsec_micros()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_offset() {
        let offset = playback_offset(21, 21);
        assert!((offset.as_secs_f64() - 0.70).abs() < 1e-6);
    }

    #[test]
    fn test_zero_fps_uses_one_second() {
        assert_eq!(playback_offset(21, 0), Duration::from_secs(1));
    }

    #[test]
    fn test_split_drops_sub_microsecond() {
        let (secs, micros) = split_timestamp(Duration::new(1_700_000_000, 123_456_789));
        assert_eq!(secs, 1_700_000_000);
        assert_eq!(micros, 123_456);
    }
}
