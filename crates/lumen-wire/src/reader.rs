//! Little-endian cursor over a byte slice.

use crate::error::{WireError, WireResult};

pub(crate) struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub(crate) fn read_bytes(&mut self, count: usize) -> WireResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .ok_or(WireError::TooLarge(count))?;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(WireError::Truncated {
                needed: end,
                available: self.buffer.len(),
            })?;
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u16_le(&mut self) -> WireResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u64_le(&mut self) -> WireResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_f64_le(&mut self) -> WireResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }
}
