//! Lumen controller wire format.
//!
//! Pure encoders and decoders for everything that crosses the TCP link
//! between the server and a pixel controller:
//!
//! - [`PixelFrameEncoder`]: one pixel window into a little-endian frame
//!   (`[u16 cmd][u16 channel][u32 count][u64 secs][u64 micros][rgb...]`)
//! - [`compress_frame`] / [`decode_envelope`]: the optional zlib envelope
//! - [`TelemetryRecord`]: the fixed 64-byte status record controllers send back
//! - [`playback_offset`]: how far ahead of render time a frame is scheduled
//!
//! Nothing in this crate performs I/O.

#![deny(static_mut_refs)]
#![warn(missing_docs, rust_2018_idioms)]

mod envelope;
mod error;
mod frame;
mod reader;
mod telemetry;
mod timing;

pub use envelope::{
    ENVELOPE_HEADER_LEN, ENVELOPE_MAGIC, ENVELOPE_RESERVED, compress_frame, decode_envelope,
    is_envelope,
};
pub use error::{WireError, WireResult};
pub use frame::{
    BYTES_PER_LED, DecodedFrame, FRAME_HEADER_LEN, LedColor, PIXEL_DATA_COMMAND, PixelFrameEncoder,
    PixelWindow, WireFrame, decode_pixel_frame, decode_stream,
};
pub use telemetry::{TELEMETRY_RECORD_LEN, TelemetryRecord};
pub use timing::{
    BUFFER_FILL_RATIO, DEFAULT_PLAYBACK_OFFSET, playback_offset, split_timestamp,
};

/// Default TCP port controllers listen on.
pub const DEFAULT_CONTROLLER_PORT: u16 = 49152;
