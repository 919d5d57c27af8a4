//! A tag-level cursor over any [Buf].
//!
//! The reader tracks how many bytes it has consumed and a current limit. Entering a
//! length-delimited sub-message pushes a tighter limit ([Reader::push_limit]); every read fails
//! rather than crossing it. Groups and sub-messages are counted against a recursion limit
//! ([Reader::enter], [Reader::leave]).

use crate::{
    tag::{Tag, WireType},
    varint, Error, Rope, DEFAULT_RECURSION_LIMIT, MAX_LENGTH,
};
use bytes::Buf;

/// Reads wire-format values from a [Buf].
pub struct Reader<B: Buf> {
    buf: B,
    position: usize,
    limit: usize,
    depth: usize,
    recursion_limit: usize,
}

impl<B: Buf> Reader<B> {
    /// Creates a reader over all of `buf`.
    pub fn new(buf: B) -> Self {
        Self::with_recursion_limit(buf, DEFAULT_RECURSION_LIMIT)
    }

    /// Creates a reader that fails with [Error::RecursionLimitExceeded] once more than
    /// `recursion_limit` groups or sub-messages are open at once.
    pub fn with_recursion_limit(buf: B, recursion_limit: usize) -> Self {
        let limit = buf.remaining();
        Self {
            buf,
            position: 0,
            limit,
            depth: 0,
            recursion_limit,
        }
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes that may be read before reaching the current limit.
    pub fn available(&self) -> usize {
        (self.limit - self.position).min(self.buf.remaining())
    }

    /// Returns whether the current limit (or the end of input) has been reached.
    pub fn is_at_end(&self) -> bool {
        self.available() == 0
    }

    /// Returns the number of open groups and sub-messages.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Reads the next tag, or returns `None` at the current limit.
    pub fn read_tag(&mut self) -> Result<Option<Tag>, Error> {
        if self.is_at_end() {
            return Ok(None);
        }
        let raw = self.read_varint()?;
        Tag::from_raw(raw).map(Some)
    }

    /// Reads a varint.
    pub fn read_varint(&mut self) -> Result<u64, Error> {
        let before = self.buf.remaining();
        let available = self.available();
        let value = varint::read_bounded(&mut self.buf, available);
        self.position += before - self.buf.remaining();
        value
    }

    /// Reads 4 little-endian bytes.
    pub fn read_fixed32(&mut self) -> Result<u32, Error> {
        if self.available() < 4 {
            return Err(Error::TruncatedMessage);
        }
        self.position += 4;
        Ok(self.buf.get_u32_le())
    }

    /// Reads 8 little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64, Error> {
        if self.available() < 8 {
            return Err(Error::TruncatedMessage);
        }
        self.position += 8;
        Ok(self.buf.get_u64_le())
    }

    /// Reads the length prefix of a length-delimited payload and checks that the payload fits
    /// within the current limit.
    pub fn read_length(&mut self) -> Result<usize, Error> {
        let len = self.read_varint()?;
        if len > MAX_LENGTH {
            return Err(Error::MalformedLength(len));
        }
        let len = len as usize;
        if len > self.available() {
            return Err(Error::TruncatedMessage);
        }
        Ok(len)
    }

    /// Reads a length-delimited payload.
    ///
    /// When the underlying buffer is a [bytes::Bytes] (or any buffer with a zero-copy
    /// [Buf::copy_to_bytes]), the returned rope shares its storage.
    pub fn read_bytes(&mut self) -> Result<Rope, Error> {
        let len = self.read_length()?;
        Ok(Rope::from(self.take(len)))
    }

    /// Consumes `len` bytes that are known to be available.
    pub(crate) fn take(&mut self, len: usize) -> bytes::Bytes {
        debug_assert!(len <= self.available());
        self.position += len;
        self.buf.copy_to_bytes(len)
    }

    /// Skips `len` bytes.
    pub fn skip_bytes(&mut self, len: usize) -> Result<(), Error> {
        if len > self.available() {
            return Err(Error::TruncatedMessage);
        }
        self.position += len;
        self.buf.advance(len);
        Ok(())
    }

    /// Restricts reads to the next `len` bytes, returning the previous limit for
    /// [Reader::pop_limit].
    pub fn push_limit(&mut self, len: usize) -> Result<usize, Error> {
        if len > self.available() {
            return Err(Error::TruncatedMessage);
        }
        let previous = self.limit;
        self.limit = self.position + len;
        Ok(previous)
    }

    /// Restores a limit returned by [Reader::push_limit].
    pub fn pop_limit(&mut self, previous: usize) {
        self.limit = previous;
    }

    /// Opens a group or sub-message.
    pub fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= self.recursion_limit {
            return Err(Error::RecursionLimitExceeded(self.recursion_limit));
        }
        self.depth += 1;
        Ok(())
    }

    /// Closes a group or sub-message opened by [Reader::enter].
    pub fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Skips the payload of a field whose tag has just been read.
    ///
    /// A group is skipped up to and including its matching END_GROUP tag.
    pub fn skip_field(&mut self, tag: Tag) -> Result<(), Error> {
        match tag.wire_type() {
            WireType::Varint => self.read_varint().map(drop),
            WireType::Fixed64 => self.read_fixed64().map(drop),
            WireType::Fixed32 => self.read_fixed32().map(drop),
            WireType::LengthDelimited => {
                let len = self.read_length()?;
                self.skip_bytes(len)
            }
            WireType::StartGroup => {
                self.enter()?;
                self.skip_group(tag.number())?;
                self.leave();
                Ok(())
            }
            WireType::EndGroup => Err(Error::InvalidEndGroup(tag.number())),
        }
    }

    /// Skips the fields of a group opened with `number`, consuming its END_GROUP tag.
    pub fn skip_group(&mut self, number: u32) -> Result<(), Error> {
        loop {
            let Some(tag) = self.read_tag()? else {
                return Err(Error::UnterminatedGroup(number));
            };
            if tag.wire_type() == WireType::EndGroup {
                if tag.number() == number {
                    return Ok(());
                }
                return Err(Error::InvalidEndGroup(tag.number()));
            }
            self.skip_field(tag)?;
        }
    }

    /// Reads a length-delimited payload and returns a reader over it.
    ///
    /// The nested reader inherits the current depth (plus one) and the recursion limit.
    pub fn read_nested(&mut self) -> Result<Reader<bytes::Bytes>, Error> {
        let len = self.read_length()?;
        if self.depth >= self.recursion_limit {
            return Err(Error::RecursionLimitExceeded(self.recursion_limit));
        }
        let bytes = self.take(len);
        let mut nested = Reader::with_recursion_limit(bytes, self.recursion_limit);
        nested.depth = self.depth + 1;
        Ok(nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use bytes::{Buf, Bytes};
    use test_case::test_case;

    fn encode(f: impl FnOnce(&mut Vec<u8>)) -> Bytes {
        let mut buf = Vec::new();
        f(&mut buf);
        Bytes::from(buf)
    }

    #[test]
    fn test_read_scalars() {
        let bytes = encode(|buf| {
            writer::write_tag(buf, 1, WireType::Varint);
            varint::write(300u64, buf);
            writer::write_tag(buf, 2, WireType::Fixed32);
            writer::write_fixed32(buf, 0xDEAD_BEEF);
            writer::write_tag(buf, 3, WireType::Fixed64);
            writer::write_fixed64(buf, u64::MAX - 1);
        });
        let mut reader = Reader::new(bytes);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(1, WireType::Varint)));
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(2, WireType::Fixed32)));
        assert_eq!(reader.read_fixed32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(3, WireType::Fixed64)));
        assert_eq!(reader.read_fixed64().unwrap(), u64::MAX - 1);
        assert_eq!(reader.read_tag().unwrap(), None);
        assert_eq!(reader.position(), 1 + 2 + 1 + 4 + 1 + 8);
    }

    #[test]
    fn test_limits_nest() {
        let bytes = encode(|buf| {
            writer::write_tag(buf, 1, WireType::LengthDelimited);
            varint::write(2u64, buf);
            writer::write_tag(buf, 2, WireType::Varint);
            varint::write(7u64, buf);
            writer::write_tag(buf, 3, WireType::Varint);
            varint::write(9u64, buf);
        });
        let mut reader = Reader::new(bytes);
        reader.read_tag().unwrap();
        let len = reader.read_length().unwrap();
        let previous = reader.push_limit(len).unwrap();
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(2, WireType::Varint)));
        assert_eq!(reader.read_varint().unwrap(), 7);
        assert_eq!(reader.read_tag().unwrap(), None);
        reader.pop_limit(previous);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(3, WireType::Varint)));
        assert_eq!(reader.read_varint().unwrap(), 9);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_reads_never_cross_limit() {
        let mut reader = Reader::new(Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05]));
        reader.push_limit(3).unwrap();
        assert_eq!(reader.read_fixed32(), Err(Error::TruncatedMessage));
        assert_eq!(reader.skip_bytes(4), Err(Error::TruncatedMessage));
        assert_eq!(reader.push_limit(4), Err(Error::TruncatedMessage));

        // A varint that would continue past the limit is malformed.
        let mut reader = Reader::new(Bytes::from_static(&[0x80, 0x80, 0x01]));
        reader.push_limit(2).unwrap();
        assert_eq!(reader.read_varint(), Err(Error::MalformedVarint));
    }

    #[test_case(&[0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F], Error::MalformedLength(u32::MAX as u64); "negative length")]
    #[test_case(&[0x0A, 0x80, 0x80, 0x80, 0x80, 0x08], Error::MalformedLength(1 << 31); "two to the thirty one")]
    #[test_case(&[0x0A, 0x05, 0x01], Error::TruncatedMessage; "longer than input")]
    #[test_case(&[0x0A], Error::MalformedVarint; "missing length")]
    fn test_bad_lengths(input: &'static [u8], expected: Error) {
        let mut reader = Reader::new(Bytes::from_static(input));
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(reader.skip_field(tag), Err(expected));
    }

    #[test]
    fn test_skip_group() {
        let bytes = encode(|buf| {
            writer::write_tag(buf, 5, WireType::StartGroup);
            writer::write_tag(buf, 1, WireType::Varint);
            varint::write(1u64, buf);
            writer::write_tag(buf, 6, WireType::StartGroup);
            writer::write_tag(buf, 6, WireType::EndGroup);
            writer::write_tag(buf, 5, WireType::EndGroup);
            writer::write_tag(buf, 2, WireType::Varint);
            varint::write(2u64, buf);
        });
        let mut reader = Reader::new(bytes);
        let tag = reader.read_tag().unwrap().unwrap();
        reader.skip_field(tag).unwrap();
        assert_eq!(reader.depth(), 0);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(2, WireType::Varint)));
    }

    #[test]
    fn test_malformed_groups() {
        // Unterminated.
        let bytes = encode(|buf| {
            writer::write_tag(buf, 5, WireType::StartGroup);
            writer::write_tag(buf, 1, WireType::Varint);
            varint::write(1u64, buf);
        });
        let mut reader = Reader::new(bytes);
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(reader.skip_field(tag), Err(Error::UnterminatedGroup(5)));

        // Mismatched end.
        let bytes = encode(|buf| {
            writer::write_tag(buf, 5, WireType::StartGroup);
            writer::write_tag(buf, 4, WireType::EndGroup);
        });
        let mut reader = Reader::new(bytes);
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(reader.skip_field(tag), Err(Error::InvalidEndGroup(4)));

        // Stray end.
        let mut reader = Reader::new(encode(|buf| writer::write_tag(buf, 3, WireType::EndGroup)));
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(reader.skip_field(tag), Err(Error::InvalidEndGroup(3)));
    }

    #[test]
    fn test_recursion_limit() {
        let depth = 10;
        let bytes = encode(|buf| {
            for _ in 0..depth {
                writer::write_tag(buf, 1, WireType::StartGroup);
            }
            for _ in 0..depth {
                writer::write_tag(buf, 1, WireType::EndGroup);
            }
        });

        let mut reader = Reader::with_recursion_limit(bytes.clone(), depth);
        let tag = reader.read_tag().unwrap().unwrap();
        reader.skip_field(tag).unwrap();
        assert!(reader.is_at_end());

        let mut reader = Reader::with_recursion_limit(bytes, depth - 1);
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(
            reader.skip_field(tag),
            Err(Error::RecursionLimitExceeded(depth - 1))
        );
    }

    #[test]
    fn test_read_bytes_shares_storage() {
        let bytes = encode(|buf| writer::write_bytes_field(buf, 1, &Rope::from(vec![7u8; 64])));
        let start = bytes.as_ptr() as usize;
        let mut reader = Reader::new(bytes.clone());
        reader.read_tag().unwrap();
        let payload = reader.read_bytes().unwrap();
        let chunk = payload.chunks().next().unwrap();
        assert_eq!(chunk.as_ptr() as usize, start + 2);
    }

    #[test]
    fn test_reads_across_chunks() {
        let first = Bytes::from_static(&[0x08, 0xAC]);
        let second = Bytes::from_static(&[0x02, 0x15, 0x01, 0x02]);
        let third = Bytes::from_static(&[0x03, 0x04]);
        let mut reader = Reader::new(first.chain(second).chain(third));
        reader.read_tag().unwrap();
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_tag().unwrap(), Some(Tag::new(2, WireType::Fixed32)));
        assert_eq!(reader.read_fixed32().unwrap(), 0x0403_0201);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_nested_reader() {
        let bytes = encode(|buf| {
            writer::write_tag(buf, 1, WireType::LengthDelimited);
            varint::write(2u64, buf);
            writer::write_tag(buf, 2, WireType::Varint);
            varint::write(1u64, buf);
        });
        let mut reader = Reader::with_recursion_limit(bytes.clone(), 1);
        reader.read_tag().unwrap();
        let mut nested = reader.read_nested().unwrap();
        assert_eq!(nested.depth(), 1);
        assert_eq!(nested.read_tag().unwrap(), Some(Tag::new(2, WireType::Varint)));
        assert!(reader.is_at_end());

        let mut reader = Reader::with_recursion_limit(bytes, 0);
        reader.read_tag().unwrap();
        assert!(matches!(
            reader.read_nested(),
            Err(Error::RecursionLimitExceeded(0))
        ));
    }
}
