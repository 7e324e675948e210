//! Bounds-checked primitive reads over an immutable class file buffer.
//!
//! The class file format is big endian throughout, and almost every structure
//! is addressed by absolute byte offset rather than by stream position (the
//! constant pool index, attribute spans and bytecode targets all hand offsets
//! around). This module therefore reads at arbitrary offsets instead of
//! consuming an `io::Read`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DecodeError, DecodeErrorKind, Result};

/// A borrowed view of the class file bytes. Copy-cheap; every reader method
/// takes the offset to read at and fails with
/// [`DecodeErrorKind::TruncatedInput`] when the read would run off the end.
#[derive(Copy, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn span(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        match self.data.get(offset..offset.saturating_add(length)) {
            Some(v) => Ok(v),
            None => Err(DecodeError::new(offset, DecodeErrorKind::TruncatedInput)),
        }
    }

    /// The raw bytes of `[offset, offset + length)`.
    pub fn bytes(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        self.span(offset, length)
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.span(offset, 1)?[0])
    }

    pub fn i8(&self, offset: usize) -> Result<i8> {
        Ok(self.u8(offset)? as i8)
    }

    pub fn u16(&self, offset: usize) -> Result<u16> {
        Ok(BigEndian::read_u16(self.span(offset, 2)?))
    }

    pub fn i16(&self, offset: usize) -> Result<i16> {
        Ok(BigEndian::read_i16(self.span(offset, 2)?))
    }

    pub fn u32(&self, offset: usize) -> Result<u32> {
        Ok(BigEndian::read_u32(self.span(offset, 4)?))
    }

    pub fn i32(&self, offset: usize) -> Result<i32> {
        Ok(BigEndian::read_i32(self.span(offset, 4)?))
    }

    pub fn u64(&self, offset: usize) -> Result<u64> {
        Ok(BigEndian::read_u64(self.span(offset, 8)?))
    }

    pub fn i64(&self, offset: usize) -> Result<i64> {
        Ok(BigEndian::read_i64(self.span(offset, 8)?))
    }

    /// 32-bit float constants are stored as their IEEE 754 bit pattern.
    pub fn f32(&self, offset: usize) -> Result<f32> {
        Ok(f32::from_bits(self.u32(offset)?))
    }

    /// 64-bit float constants are stored as their IEEE 754 bit pattern.
    pub fn f64(&self, offset: usize) -> Result<f64> {
        Ok(f64::from_bits(self.u64(offset)?))
    }
}
