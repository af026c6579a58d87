//! Pixel frame encoding.
//!
//! Layout (all little-endian):
//! - Bytes 0-1: command (`3`, pixel data)
//! - Bytes 2-3: controller channel
//! - Bytes 4-7: LED count
//! - Bytes 8-15: playback timestamp, whole seconds since the Unix epoch
//! - Bytes 16-23: playback timestamp, microsecond remainder
//! - Bytes 24..: three bytes per LED (`R,G,B`, or `G,R,B` when swapped)

use std::time::Duration;

use crate::envelope::{decode_envelope, envelope_len, is_envelope};
use crate::error::{WireError, WireResult};
use crate::reader::ByteReader;
use crate::timing::split_timestamp;

/// Command word for a pixel-data frame.
pub const PIXEL_DATA_COMMAND: u16 = 3;

/// Bytes before the first LED triplet.
pub const FRAME_HEADER_LEN: usize = 24;

/// Bytes per LED on the wire.
pub const BYTES_PER_LED: usize = 3;

/// One 24-bit pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LedColor {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl LedColor {
    /// All channels off.
    pub const BLACK: LedColor = LedColor::new(0, 0, 0);

    /// Create a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color with red and green exchanged.
    pub const fn swapped(self) -> Self {
        Self {
            r: self.g,
            g: self.r,
            b: self.b,
        }
    }
}

/// Region of a site canvas that one controller displays.
///
/// Pixels are addressed linearly; the window covers `width * height`
/// consecutive pixels starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    /// First pixel of the window
    pub offset: usize,
    /// Window width in pixels
    pub width: usize,
    /// Window height in pixels
    pub height: usize,
}

impl PixelWindow {
    /// Create a window.
    pub const fn new(offset: usize, width: usize, height: usize) -> Self {
        Self {
            offset,
            width,
            height,
        }
    }

    /// Number of LEDs covered, `None` on overflow.
    pub fn led_count(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }

    /// Whether the window lies inside a buffer of `available` pixels.
    pub fn fits(&self, available: usize) -> bool {
        self.led_count()
            .and_then(|count| self.offset.checked_add(count))
            .is_some_and(|end| end <= available)
    }

    fn slice<'a>(&self, pixels: &'a [LedColor]) -> WireResult<&'a [LedColor]> {
        let out_of_bounds = || WireError::WindowOutOfBounds {
            offset: self.offset,
            count: self.led_count().unwrap_or(usize::MAX),
            available: pixels.len(),
        };
        let count = self.led_count().ok_or_else(out_of_bounds)?;
        let end = self.offset.checked_add(count).ok_or_else(out_of_bounds)?;
        pixels.get(self.offset..end).ok_or_else(out_of_bounds)
    }
}

/// Immutable encoded buffer ready to hand to a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    bytes: Vec<u8>,
    compressed: bool,
}

impl WireFrame {
    pub(crate) fn raw(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compressed: false,
        }
    }

    pub(crate) fn enveloped(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compressed: true,
        }
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the bytes are wrapped in the compression envelope.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Take ownership of the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encoder for one controller's pixel window.
///
/// Configuration is fixed at construction; [`encode`](Self::encode) is pure
/// and may be called from any thread.
#[derive(Debug, Clone, Copy)]
pub struct PixelFrameEncoder {
    window: PixelWindow,
    channel: u16,
    swap_red_green: bool,
    reversed: bool,
}

impl PixelFrameEncoder {
    /// Create an encoder for `window` on channel 0, RGB order, forward.
    pub fn new(window: PixelWindow) -> Self {
        Self {
            window,
            channel: 0,
            swap_red_green: false,
            reversed: false,
        }
    }

    /// Set the controller channel written into byte 2-3.
    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// Emit `G,R,B` instead of `R,G,B`.
    pub fn with_swap_red_green(mut self, swap: bool) -> Self {
        self.swap_red_green = swap;
        self
    }

    /// Emit the window last pixel first.
    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Configured window.
    pub fn window(&self) -> PixelWindow {
        self.window
    }

    /// Encode the window of `pixels` scheduled for playback at `timestamp`
    /// (time since the Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::WindowOutOfBounds`] if the window does not fit
    /// `pixels`.
    pub fn encode(&self, pixels: &[LedColor], timestamp: Duration) -> WireResult<WireFrame> {
        let window = self.window.slice(pixels)?;
        let Ok(count) = u32::try_from(window.len()) else {
            return Err(WireError::TooLarge(window.len()));
        };
        let body_len = window
            .len()
            .checked_mul(BYTES_PER_LED)
            .and_then(|body| body.checked_add(FRAME_HEADER_LEN))
            .ok_or(WireError::TooLarge(window.len()))?;

        let (seconds, micros) = split_timestamp(timestamp);
        let mut out = Vec::with_capacity(body_len);
        out.extend_from_slice(&PIXEL_DATA_COMMAND.to_le_bytes());
        out.extend_from_slice(&self.channel.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&seconds.to_le_bytes());
        out.extend_from_slice(&micros.to_le_bytes());

        if self.reversed {
            window.iter().rev().for_each(|c| self.push_led(&mut out, *c));
        } else {
            window.iter().for_each(|c| self.push_led(&mut out, *c));
        }

        Ok(WireFrame::raw(out))
    }

    fn push_led(&self, out: &mut Vec<u8>, color: LedColor) {
        let color = if self.swap_red_green {
            color.swapped()
        } else {
            color
        };
        out.extend_from_slice(&[color.r, color.g, color.b]);
    }
}

/// A pixel frame read back off the wire.
///
/// Pixels are in wire order: no red/green swap or reversal is undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Controller channel
    pub channel: u16,
    /// Playback timestamp since the Unix epoch
    pub timestamp: Duration,
    /// LED triplets
    pub pixels: Vec<LedColor>,
}

fn read_frame(reader: &mut ByteReader<'_>) -> WireResult<DecodedFrame> {
    let command = reader.read_u16_le()?;
    if command != PIXEL_DATA_COMMAND {
        return Err(WireError::BadCommand(command));
    }
    let channel = reader.read_u16_le()?;
    let count = reader.read_u32_le()? as usize;
    let seconds = reader.read_u64_le()?;
    let micros = reader.read_u64_le()?;
    let body_len = count
        .checked_mul(BYTES_PER_LED)
        .ok_or(WireError::TooLarge(count))?;
    let body = reader.read_bytes(body_len)?;

    let pixels = body
        .chunks_exact(BYTES_PER_LED)
        .filter_map(|chunk| match chunk {
            [r, g, b] => Some(LedColor::new(*r, *g, *b)),
            _ => None,
        })
        .collect();

    Ok(DecodedFrame {
        channel,
        timestamp: Duration::from_secs(seconds).saturating_add(Duration::from_micros(micros)),
        pixels,
    })
}

/// Decode exactly one uncompressed pixel frame.
///
/// # Errors
///
/// Fails on a short buffer, a non-pixel command, or trailing bytes.
pub fn decode_pixel_frame(bytes: &[u8]) -> WireResult<DecodedFrame> {
    let mut reader = ByteReader::new(bytes);
    let frame = read_frame(&mut reader)?;
    if reader.remaining() != 0 {
        return Err(WireError::LengthMismatch {
            declared: reader.position(),
            actual: bytes.len(),
        });
    }
    Ok(frame)
}

/// Decode a batch: any sequence of raw frames and compression envelopes
/// concatenated into one send.
pub fn decode_stream(bytes: &[u8]) -> WireResult<Vec<DecodedFrame>> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if is_envelope(rest) {
            let total = envelope_len(rest)?;
            let (envelope, tail) = rest.split_at_checked(total).ok_or(WireError::Truncated {
                needed: total,
                available: rest.len(),
            })?;
            frames.push(decode_pixel_frame(&decode_envelope(envelope)?)?);
            rest = tail;
        } else {
            let mut reader = ByteReader::new(rest);
            frames.push(read_frame(&mut reader)?);
            rest = rest.get(reader.position()..).unwrap_or_default();
        }
    }
    Ok(frames)
}
