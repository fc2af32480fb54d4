//! Primitive typed values on the wire.
//!
//! All multi-byte values are big-endian. Byte buffers carry a 4-byte signed
//! big-endian length prefix; strings are byte buffers of their UTF-8 bytes.
//! Characters are single UTF-16 code units.

use std::io::{ErrorKind, Read};

use bytes::{BufMut, BytesMut};

use crate::codec::DEFAULT_MAX_PAYLOAD;
use crate::error::{FrameError, Result};

/// Appends typed values to an output buffer.
pub struct WireWriter<'a> {
    dst: &'a mut BytesMut,
    max_len: usize,
}

impl<'a> WireWriter<'a> {
    /// Create a writer over `dst` with the default byte-buffer limit.
    pub fn new(dst: &'a mut BytesMut) -> Self {
        Self::with_limit(dst, DEFAULT_MAX_PAYLOAD)
    }

    /// Create a writer that rejects byte buffers longer than `max_len`.
    pub fn with_limit(dst: &'a mut BytesMut, max_len: usize) -> Self {
        Self { dst, max_len }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.dst.put_u8(u8::from(value));
    }

    pub fn write_i8(&mut self, value: i8) {
        self.dst.put_i8(value);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.dst.put_u8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.dst.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.dst.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.dst.put_i64(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.dst.put_u64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.dst.put_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.dst.put_u64(value.to_bits());
    }

    /// Write one UTF-16 code unit.
    pub fn write_char(&mut self, unit: u16) {
        self.dst.put_u16(unit);
    }

    /// Write a length-prefixed byte buffer.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let max = self.max_len.min(i32::MAX as usize);
        if value.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: value.len(),
                max,
            });
        }
        self.dst.reserve(4 + value.len());
        self.dst.put_i32(value.len() as i32);
        self.dst.put_slice(value);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Bytes written to the underlying buffer so far (including anything
    /// that was there before this writer was created).
    pub fn len(&self) -> usize {
        self.dst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dst.is_empty()
    }
}

/// Reads typed values from a blocking byte source.
pub struct WireReader<'a> {
    src: &'a mut dyn Read,
    max_len: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over `src` with the default byte-buffer limit.
    pub fn new(src: &'a mut dyn Read) -> Self {
        Self::with_limit(src, DEFAULT_MAX_PAYLOAD)
    }

    /// Create a reader that rejects length prefixes above `max_len`.
    pub fn with_limit(src: &'a mut dyn Read, max_len: usize) -> Self {
        Self { src, max_len }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.src.read_exact(buf).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => FrameError::Io(err),
        })
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(u8::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(u32::from_be_bytes(self.read_array()?)))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
    }

    /// Read one UTF-16 code unit.
    pub fn read_char(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read exactly `N` raw bytes with no length prefix.
    pub fn read_raw<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_array()
    }

    /// Read a length-prefixed byte buffer.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(FrameError::NegativeLength(len));
        }
        let len = len as usize;
        if len > self.max_len {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_len,
            });
        }
        let mut buf = vec![0u8; len];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_bytes()?)?)
    }
}
