//! Snapshot tests pinning the byte layout controllers depend on.

use insta::assert_snapshot;
use lumen_wire::{LedColor, PixelFrameEncoder, PixelWindow, TelemetryRecord};
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_snapshot_swapped_two_pixel_frame() -> TestResult {
    let pixels = [LedColor::new(0xFF, 0x00, 0x10), LedColor::new(0x01, 0x02, 0x03)];
    let encoder = PixelFrameEncoder::new(PixelWindow::new(0, 2, 1))
        .with_channel(1)
        .with_swap_red_green(true);
    let frame = encoder.encode(&pixels, Duration::new(1, 500))?;
    assert_snapshot!(
        format!("{:02X?}", frame.as_bytes()),
        @"[03, 00, 01, 00, 02, 00, 00, 00, 01, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, 00, FF, 10, 02, 01, 03]"
    );
    Ok(())
}

#[test]
fn test_snapshot_telemetry_record() {
    let record = TelemetryRecord {
        size: 64,
        flash_version: 7,
        current_clock: 12.5,
        oldest_packet: 12.0,
        newest_packet: 13.0,
        brightness: 1.0,
        wifi_signal: -55.0,
        buffer_size: 300,
        buffer_pos: 42,
        fps_drawing: 21,
        watts: 9,
    };
    assert_snapshot!(
        format!("{:02X?}", record.to_bytes()),
        @"[40, 00, 00, 00, 07, 00, 00, 00, 00, 00, 00, 00, 00, 00, 29, 40, 00, 00, 00, 00, 00, 00, 28, 40, 00, 00, 00, 00, 00, 00, 2A, 40, 00, 00, 00, 00, 00, 00, F0, 3F, 00, 00, 00, 00, 00, 80, 4B, C0, 2C, 01, 00, 00, 2A, 00, 00, 00, 15, 00, 00, 00, 09, 00, 00, 00]"
    );
}
