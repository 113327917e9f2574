//! Buffer management utilities

use bytes::{Buf, Bytes, BytesMut};

/// The unread tail of the last chunk pulled from a download stream
#[derive(Debug, Default)]
pub(crate) struct PendingChunk {
    data: Bytes,
}

impl PendingChunk {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the pending data with a freshly downloaded chunk
    pub fn refill(&mut self, data: Bytes) {
        self.data = data;
    }

    /// Copy as much pending data as fits into `buf`, returning the count
    pub fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.advance(n);
        n
    }
}

/// A write buffer that accumulates data before uploading
#[derive(Debug)]
pub(crate) struct WriteBuffer {
    buffer: BytesMut,
}

impl WriteBuffer {
    /// Create a new write buffer with the given initial capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Split off the first `size` bytes if that many are buffered
    pub fn take_part(&mut self, size: usize) -> Option<Bytes> {
        if size == 0 || self.buffer.len() < size {
            return None;
        }
        Some(self.buffer.split_to(size).freeze())
    }

    /// Take the buffer contents, leaving it empty
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
