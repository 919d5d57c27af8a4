//! Whole-value encoding for wire primitives and messages.
//!
//! Field-level writes go through [crate::writer] and field-level reads through the cursors in
//! [crate::reader] and [crate::decode]. The traits here cover values that are encoded on their
//! own: a varint, a tag, a length-prefixed payload, or a complete message.

use crate::error::Error;
use bytes::{Buf, BufMut, BytesMut};

/// A value that writes its wire encoding to a buffer.
pub trait Write {
    fn write(&self, buf: &mut impl BufMut);
}

/// A value that knows the length of its wire encoding before it is written.
pub trait EncodeSize {
    /// Returns exactly the number of bytes [Write::write] produces.
    fn encode_size(&self) -> usize;
}

/// A value read from the front of a buffer.
pub trait Read: Sized {
    /// Reads one value, leaving any bytes after it in `buf`.
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;
}

/// Encodes a value into a buffer sized by [EncodeSize].
pub trait Encode: Write + EncodeSize {
    /// Panics if [Write::write] and [EncodeSize::encode_size] disagree.
    fn encode(&self) -> BytesMut {
        let len = self.encode_size();
        let mut buffer = BytesMut::with_capacity(len);
        self.write(&mut buffer);
        assert_eq!(buffer.len(), len, "encoded size mismatch");
        buffer
    }
}

impl<T: Write + EncodeSize> Encode for T {}

/// Decodes a value that must span the whole buffer.
pub trait Decode: Read {
    /// Fails with [Error::ExtraData] if bytes remain after the value.
    fn decode(mut buf: impl Buf) -> Result<Self, Error> {
        let value = Self::read(&mut buf)?;
        match buf.remaining() {
            0 => Ok(value),
            remaining => Err(Error::ExtraData(remaining)),
        }
    }
}

impl<T: Read> Decode for T {}
