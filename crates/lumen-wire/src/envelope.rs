//! Compression envelope.
//!
//! `[u32 magic][u32 compressed len][u32 raw len][u32 reserved][zlib bytes]`,
//! little-endian. Controllers recognise the envelope by its magic word; a
//! raw frame starts with command `3` and can never collide with it.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{WireError, WireResult};
use crate::frame::WireFrame;
use crate::reader::ByteReader;

/// First word of every envelope.
pub const ENVELOPE_MAGIC: u32 = 0x4441_5645;

/// Fourth word of every envelope.
pub const ENVELOPE_RESERVED: u32 = 0x1234_5678;

/// Envelope header size.
pub const ENVELOPE_HEADER_LEN: usize = 16;

fn length_word(len: usize) -> WireResult<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .or(Err(WireError::TooLarge(len)))
}

/// Compress a raw frame at maximum zlib level.
///
/// Returns the raw frame untouched when the envelope would not be smaller,
/// so a compressed send never costs more bytes than an uncompressed one.
pub fn compress_frame(frame: WireFrame) -> WireResult<WireFrame> {
    if frame.is_compressed() {
        return Ok(frame);
    }
    let raw = frame.as_bytes();
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len()), Compression::best());
    encoder
        .write_all(raw)
        .map_err(|e| WireError::Compression(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| WireError::Compression(e.to_string()))?;

    let envelope_len = compressed.len().saturating_add(ENVELOPE_HEADER_LEN);
    if envelope_len >= raw.len() {
        return Ok(frame);
    }

    let mut out = Vec::with_capacity(envelope_len);
    out.extend_from_slice(&ENVELOPE_MAGIC.to_le_bytes());
    out.extend_from_slice(&length_word(compressed.len())?);
    out.extend_from_slice(&length_word(raw.len())?);
    out.extend_from_slice(&ENVELOPE_RESERVED.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(WireFrame::enveloped(out))
}

/// Whether `bytes` starts with the envelope magic.
pub fn is_envelope(bytes: &[u8]) -> bool {
    ByteReader::new(bytes)
        .read_u32_le()
        .is_ok_and(|magic| magic == ENVELOPE_MAGIC)
}

struct EnvelopeHeader {
    compressed_len: usize,
    raw_len: usize,
}

fn read_header(reader: &mut ByteReader<'_>) -> WireResult<EnvelopeHeader> {
    let magic = reader.read_u32_le()?;
    if magic != ENVELOPE_MAGIC {
        return Err(WireError::BadMagic(magic));
    }
    let compressed_len = reader.read_u32_le()? as usize;
    let raw_len = reader.read_u32_le()? as usize;
    let reserved = reader.read_u32_le()?;
    if reserved != ENVELOPE_RESERVED {
        return Err(WireError::BadMagic(reserved));
    }
    Ok(EnvelopeHeader {
        compressed_len,
        raw_len,
    })
}

/// Total length (header plus payload) of the envelope at the start of `bytes`.
pub(crate) fn envelope_len(bytes: &[u8]) -> WireResult<usize> {
    let header = read_header(&mut ByteReader::new(bytes))?;
    header
        .compressed_len
        .checked_add(ENVELOPE_HEADER_LEN)
        .ok_or(WireError::TooLarge(header.compressed_len))
}

/// Unwrap one envelope and return the raw frame bytes.
///
/// # Errors
///
/// Fails on a bad marker, a payload whose size disagrees with the header,
/// or a zlib stream that does not inflate to the declared raw length.
pub fn decode_envelope(bytes: &[u8]) -> WireResult<Vec<u8>> {
    let mut reader = ByteReader::new(bytes);
    let header = read_header(&mut reader)?;
    if reader.remaining() != header.compressed_len {
        return Err(WireError::LengthMismatch {
            declared: header.compressed_len,
            actual: reader.remaining(),
        });
    }
    let payload = reader.read_bytes(header.compressed_len)?;

    let mut raw = Vec::with_capacity(header.raw_len);
    ZlibDecoder::new(payload)
        .read_to_end(&mut raw)
        .map_err(|e| WireError::Compression(e.to_string()))?;
    if raw.len() != header.raw_len {
        return Err(WireError::LengthMismatch {
            declared: header.raw_len,
            actual: raw.len(),
        });
    }
    Ok(raw)
}
