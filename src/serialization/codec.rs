//! Binary Encoder/Decoder
//!
//! Big-endian fixed-width primitives and `i32`-length-prefixed byte arrays.
//! A nullable byte array is written with length `-1`.
//!
//! Every read checks the remaining length first, so a truncated buffer yields
//! `DecodeError::Truncated` instead of a panic inside `bytes`.

use crate::error::DecodeError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const NULL_LENGTH: i32 = -1;

/// Growable big-endian output buffer.
#[derive(Debug, Default)]
pub struct ObjectDataOutput {
    buf: BytesMut,
}

impl ObjectDataOutput {
    /// Empty buffer with room for a small record.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Writes one raw byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Writes `1` or `0`.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    /// Writes 4 bytes, big-endian.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    /// Writes 8 bytes, big-endian.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Writes a collection size. Collections larger than `i32::MAX` are not representable.
    pub fn write_len(&mut self, len: usize) {
        self.write_i32(i32::try_from(len).unwrap_or(i32::MAX));
    }

    /// Length prefix followed by the raw bytes.
    pub fn write_byte_array(&mut self, value: &[u8]) {
        self.write_len(value.len());
        self.buf.put_slice(value);
    }

    /// Like `write_byte_array`, with `None` written as length `-1`.
    pub fn write_nullable_byte_array(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => self.write_byte_array(bytes),
            None => self.write_i32(NULL_LENGTH),
        }
    }

    /// UTF-8 bytes of `value` as a byte array.
    pub fn write_string(&mut self, value: &str) {
        self.write_byte_array(value.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes the buffer into immutable `Bytes`.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a received buffer. Reads consume from the front.
#[derive(Debug, Clone)]
pub struct ObjectDataInput {
    buf: Bytes,
}

impl ObjectDataInput {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Drops everything left in the stream and returns how many bytes that was.
    pub fn skip_remaining(&mut self) -> usize {
        let remaining = self.buf.remaining();
        self.buf.advance(remaining);
        remaining
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DecodeError::Truncated { needed, remaining });
        }
        Ok(())
    }

    /// Reads one raw byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// Reads a collection size written by `write_len`.
    ///
    /// Every element occupies at least `min_element_size` bytes, which bounds the
    /// size against what is actually left in the buffer before anyone allocates.
    pub fn read_len(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        let len = len as usize;
        self.ensure(len.saturating_mul(min_element_size))?;
        Ok(len)
    }

    /// Reads a length-prefixed array without copying out of the buffer.
    pub fn read_byte_array(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_len(1)?;
        Ok(self.buf.split_to(len))
    }

    /// Length `-1` reads as `None`; any other negative length is an error.
    pub fn read_nullable_byte_array(&mut self) -> Result<Option<Bytes>, DecodeError> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        self.ensure(len as usize)?;
        Ok(Some(self.buf.split_to(len as usize)))
    }

    /// Reads a byte array and checks that it is UTF-8.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_byte_array()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}
