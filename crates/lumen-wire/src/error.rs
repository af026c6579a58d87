//! Error types for the wire codec.

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The pixel window does not fit inside the supplied pixel buffer
    #[error("Pixel window {offset}+{count} exceeds buffer of {available} pixels")]
    WindowOutOfBounds {
        /// First pixel of the window
        offset: usize,
        /// Pixels in the window
        count: usize,
        /// Pixels in the buffer
        available: usize,
    },

    /// Input ended before a complete structure was read
    #[error("Truncated input: needed {needed} bytes, had {available}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// The frame carries a command other than pixel data
    #[error("Unsupported frame command {0}")]
    BadCommand(u16),

    /// The envelope header carries the wrong magic or reserved word
    #[error("Bad envelope marker 0x{0:08X}")]
    BadMagic(u32),

    /// A declared length disagrees with the payload
    #[error("Length mismatch: header says {declared} bytes, payload has {actual}")]
    LengthMismatch {
        /// Length declared in the header
        declared: usize,
        /// Length actually present
        actual: usize,
    },

    /// A buffer is too large for a 32-bit length field
    #[error("Frame of {0} bytes does not fit the wire length field")]
    TooLarge(usize),

    /// zlib failed
    #[error("Compression failure: {0}")]
    Compression(String),
}

/// Codec result type
pub type WireResult<T> = Result<T, WireError>;
