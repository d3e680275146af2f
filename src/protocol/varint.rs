//! Variable-Length Integers and Framed Bytes
//!
//! Hot Rod encodes lengths, counts and ids as unsigned little-endian base-128
//! integers: seven bits per byte, high bit set on every byte but the last.
//! Byte arrays and strings are a vint length followed by the raw bytes.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Longest encoding of a 32-bit vint
const MAX_VINT_BYTES: usize = 5;

/// Longest encoding of a 64-bit vlong
const MAX_VLONG_BYTES: usize = 10;

/// Why a read from a frame failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadError {
    /// The buffer ends before the value does
    #[error("incomplete frame")]
    Incomplete,

    /// The bytes can never form a valid value
    #[error("{0}")]
    Invalid(String),
}

/// Writes a 32-bit vint.
pub fn write_vint(buf: &mut BytesMut, value: u32) {
    write_vlong(buf, value as u64);
}

/// Writes a 64-bit vlong.
pub fn write_vlong(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Writes a length-prefixed byte array.
pub fn write_array(buf: &mut BytesMut, data: &[u8]) {
    write_vint(buf, data.len() as u32);
    buf.put_slice(data);
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_array(buf, s.as_bytes());
}

/// A forward-only cursor over a buffer that may not yet hold a whole frame.
#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let byte = *self.buf.get(self.pos).ok_or(ReadError::Incomplete)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_vint(&mut self) -> Result<u32, ReadError> {
        let value = self.read_varint(MAX_VINT_BYTES)?;
        u32::try_from(value).map_err(|_| ReadError::Invalid(format!("vint overflow: {}", value)))
    }

    pub fn read_vlong(&mut self) -> Result<u64, ReadError> {
        self.read_varint(MAX_VLONG_BYTES)
    }

    fn read_varint(&mut self, max_bytes: usize) -> Result<u64, ReadError> {
        let mut value = 0u64;
        for i in 0..max_bytes {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ReadError::Invalid(format!(
            "variable length integer longer than {} bytes",
            max_bytes
        )))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self.pos.checked_add(len).ok_or(ReadError::Incomplete)?;
        let slice = self.buf.get(self.pos..end).ok_or(ReadError::Incomplete)?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a length-prefixed byte array, rejecting lengths above `max_len`.
    pub fn read_array(&mut self, max_len: usize) -> Result<Bytes, ReadError> {
        let len = self.read_vint()? as usize;
        if len > max_len {
            return Err(ReadError::Invalid(format!(
                "array of {} bytes exceeds the {} byte limit",
                len, max_len
            )));
        }
        Ok(Bytes::copy_from_slice(self.read_bytes(len)?))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self, max_len: usize) -> Result<String, ReadError> {
        let raw = self.read_array(max_len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ReadError::Invalid(format!("invalid UTF-8 string: {}", e)))
    }
}
