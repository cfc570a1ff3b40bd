//! Fixed-width primitives for the object stream.
//!
//! All integers are little-endian. Variable-length data is written as a
//! `u64` byte length followed by the bytes ("block").

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{StreamError, StreamResult};

/// Append-only output buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a length-prefixed block.
    pub fn put_block(&mut self, bytes: &[u8]) {
        self.put_u64(bytes.len() as u64);
        self.put_raw(bytes);
    }

    /// Write a collection length as `u32`, failing if it does not fit.
    pub fn put_count(&mut self, count: usize) -> StreamResult<()> {
        let count = u32::try_from(count).map_err(|_| StreamError::CountOverflow(count))?;
        self.put_u32(count);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over an input buffer. Every read is bounds-checked and reports
/// [`StreamError::Truncated`] instead of panicking.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> StreamResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(StreamError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> StreamResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u32(&mut self) -> StreamResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> StreamResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_count(&mut self) -> StreamResult<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Read a length-prefixed block.
    pub fn read_block(&mut self) -> StreamResult<&'a [u8]> {
        let offset = self.pos;
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| StreamError::Truncated {
            offset,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_roundtrip() {
        let mut w = WireWriter::new();
        w.put_u32(7);
        w.put_u64(u64::MAX - 1);
        w.put_block(b"abc");
        let bytes = w.freeze();
        assert_eq!(bytes.len(), 4 + 8 + 8 + 3);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(r.read_block().unwrap(), b"abc");
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_reports_position() {
        let mut r = WireReader::new(&[1, 2, 3]);
        let err = r.read_u32().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Truncated { offset: 0, needed: 4, available: 3 }
        ));
    }

    #[test]
    fn block_longer_than_input() {
        let mut w = WireWriter::new();
        w.put_u64(100);
        w.put_raw(b"short");
        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(r.read_block(), Err(StreamError::Truncated { .. })));
    }

    #[test]
    fn little_endian_layout() {
        let mut w = WireWriter::new();
        w.put_u32(0x0102_0304);
        assert_eq!(&w.freeze()[..], &[4, 3, 2, 1]);
    }
}
