//! Tag-level writers and a chunked output sink.
//!
//! Every writer targets any [BufMut]. Sizes are computed by the matching `*_size` helpers so that
//! callers can size their output before writing it.

use crate::{
    tag::{Tag, WireType},
    varint, Rope,
};
use bytes::{buf::UninitSlice, BufMut, Bytes, BytesMut};
use std::num::NonZeroUsize;

/// Writes the tag for `number` and `wire_type`.
#[inline]
pub fn write_tag(buf: &mut impl BufMut, number: u32, wire_type: WireType) {
    varint::write(Tag::new(number, wire_type).raw(), buf);
}

/// Writes 4 little-endian bytes.
#[inline]
pub fn write_fixed32(buf: &mut impl BufMut, value: u32) {
    buf.put_u32_le(value);
}

/// Writes 8 little-endian bytes.
#[inline]
pub fn write_fixed64(buf: &mut impl BufMut, value: u64) {
    buf.put_u64_le(value);
}

/// Writes a length prefix.
#[inline]
pub fn write_length(buf: &mut impl BufMut, len: usize) {
    varint::write(len as u64, buf);
}

/// Writes the leaves of `bytes` without a length prefix.
pub fn write_rope(buf: &mut impl BufMut, bytes: &Rope) {
    for chunk in bytes.chunks() {
        buf.put_slice(chunk);
    }
}

/// Writes a complete length-delimited field.
pub fn write_bytes_field(buf: &mut impl BufMut, number: u32, bytes: &Rope) {
    write_tag(buf, number, WireType::LengthDelimited);
    write_length(buf, bytes.len());
    write_rope(buf, bytes);
}

/// Returns the size of the tag for `number`.
#[inline]
pub fn tag_size(number: u32) -> usize {
    Tag::size(number)
}

/// Returns the size of a length prefix and `len` bytes of payload.
#[inline]
pub fn length_delimited_size(len: usize) -> usize {
    varint::size(len as u64) + len
}

/// A [BufMut] that collects output into chunks of at most a fixed size.
///
/// Each full chunk is frozen as soon as it fills, so arbitrarily large output never requires a
/// single contiguous allocation. The concatenation of [ChunkedSink::into_chunks] is exactly what
/// was written.
pub struct ChunkedSink {
    chunk_size: usize,
    current: BytesMut,
    chunks: Vec<Bytes>,
    written: usize,
}

impl ChunkedSink {
    /// Creates a sink emitting chunks of `chunk_size` bytes (the last chunk may be shorter).
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        let chunk_size = chunk_size.get();
        Self {
            chunk_size,
            current: BytesMut::with_capacity(chunk_size),
            chunks: Vec::new(),
            written: 0,
        }
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.written
    }

    /// Returns whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Returns the number of completed chunks.
    pub fn completed(&self) -> usize {
        self.chunks.len()
    }

    fn rotate(&mut self) {
        let full = std::mem::replace(&mut self.current, BytesMut::with_capacity(self.chunk_size));
        self.chunks.push(full.freeze());
    }

    /// Returns the written chunks, in order.
    pub fn into_chunks(mut self) -> Vec<Bytes> {
        if !self.current.is_empty() {
            self.rotate();
        }
        self.chunks
    }

    /// Returns the written bytes as a rope whose leaves are the chunks.
    pub fn into_rope(self) -> Rope {
        Rope::from_chunks(self.into_chunks())
    }
}

// SAFETY: BufMut implementation for ChunkedSink.
// - `remaining_mut()` is unbounded (a new chunk is started whenever one fills)
// - `chunk_mut()` returns the uninitialized tail of the current chunk, never beyond `chunk_size`
// - `advance_mut()` advances the current chunk within that tail
unsafe impl BufMut for ChunkedSink {
    #[inline]
    fn remaining_mut(&self) -> usize {
        usize::MAX - self.written
    }

    #[inline]
    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(
            cnt <= self.chunk_size - self.current.len(),
            "cannot advance past end of chunk"
        );
        // SAFETY: the caller initialized `cnt` bytes of the slice returned by `chunk_mut`.
        unsafe { self.current.advance_mut(cnt) };
        self.written += cnt;
        if self.current.len() == self.chunk_size {
            self.rotate();
        }
    }

    #[inline]
    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.current.len() == self.chunk_size {
            self.rotate();
        }
        let available = self.chunk_size - self.current.len();
        &mut self.current.chunk_mut()[..available]
    }
}
