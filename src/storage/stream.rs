//! Sequential byte cursors used by tuple serialization.
//!
//! - **SerializeOutput**: big-endian writer for the row-store format, with
//!   reserve-and-backpatch support for length prefixes
//! - **SerializeInput**: bounds-checked big-endian reader over a byte slice
//! - **ExportSerializeOutput**: little-endian writer for the export format

use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Big-endian output cursor.
#[derive(Debug, Default)]
pub struct SerializeOutput {
    buffer: BytesMut,
}

impl SerializeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_byte(&mut self, value: i8) {
        self.buffer.put_i8(value);
    }

    pub fn write_short(&mut self, value: i16) {
        self.buffer.put_i16(value);
    }

    pub fn write_int(&mut self, value: i32) {
        self.buffer.put_i32(value);
    }

    pub fn write_long(&mut self, value: i64) {
        self.buffer.put_i64(value);
    }

    pub fn write_double(&mut self, value: f64) {
        self.buffer.put_f64(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// Current write position (number of bytes written so far).
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Append `len` zero bytes and return the position where they start.
    pub fn reserve_bytes(&mut self, len: usize) -> usize {
        let start = self.buffer.len();
        self.buffer.put_bytes(0, len);
        start
    }

    /// Overwrite four already-written bytes at `position`.
    ///
    /// Panics if `position + 4` lies past the current write position.
    pub fn write_int_at(&mut self, position: usize, value: i32) {
        BigEndian::write_i32(&mut self.buffer[position..position + 4], value);
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// Big-endian input cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SerializeInput<'a> {
    data: &'a [u8],
    rest: &'a [u8],
}

impl<'a> SerializeInput<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, rest: data }
    }

    fn ensure(&self, needed: usize) -> StorageResult<()> {
        if self.rest.remaining() < needed {
            return Err(StorageError::UnexpectedEof {
                needed,
                remaining: self.rest.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> StorageResult<i8> {
        self.ensure(1)?;
        Ok(self.rest.get_i8())
    }

    pub fn read_short(&mut self) -> StorageResult<i16> {
        self.ensure(2)?;
        Ok(self.rest.get_i16())
    }

    pub fn read_int(&mut self) -> StorageResult<i32> {
        self.ensure(4)?;
        Ok(self.rest.get_i32())
    }

    pub fn read_long(&mut self) -> StorageResult<i64> {
        self.ensure(8)?;
        Ok(self.rest.get_i64())
    }

    pub fn read_double(&mut self) -> StorageResult<f64> {
        self.ensure(8)?;
        Ok(self.rest.get_f64())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    pub fn position(&self) -> usize {
        self.data.len() - self.rest.len()
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    pub fn has_remaining(&self) -> bool {
        !self.rest.is_empty()
    }
}

/// Little-endian output cursor for the export format.
#[derive(Debug, Default)]
pub struct ExportSerializeOutput {
    buffer: BytesMut,
}

impl ExportSerializeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_int(&mut self, value: i32) {
        self.buffer.put_i32_le(value);
    }

    pub fn write_long(&mut self, value: i64) {
        self.buffer.put_i64_le(value);
    }

    pub fn write_double(&mut self, value: f64) {
        self.buffer.put_f64_le(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// Write a 32-bit length followed by the raw bytes.
    pub fn write_binary_string(&mut self, bytes: &[u8]) {
        self.write_int(bytes.len() as i32);
        self.write_bytes(bytes);
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}
