//! Field tags.
//!
//! Every field on the wire starts with a tag: the varint `(field_number << 3) | wire_type`.

use crate::{varint, EncodeSize, Error, Read, Write};
use bytes::{Buf, BufMut};
use std::fmt;

/// The largest valid field number (the top 3 bits of a 32-bit tag hold the wire type).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

const WIRE_TYPE_BITS: u32 = 3;
const WIRE_TYPE_MASK: u64 = 0b111;

/// The shape of the payload that follows a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireType {
    /// A single varint.
    Varint = 0,
    /// 8 little-endian bytes.
    Fixed64 = 1,
    /// A varint length followed by that many bytes.
    LengthDelimited = 2,
    /// Opens a group terminated by a matching [WireType::EndGroup].
    StartGroup = 3,
    /// Closes a group.
    EndGroup = 4,
    /// 4 little-endian bytes.
    Fixed32 = 5,
}

impl WireType {
    /// Returns whether repeated values of this wire type may be packed into a single
    /// length-delimited record.
    pub const fn is_packable(self) -> bool {
        matches!(self, Self::Varint | Self::Fixed64 | Self::Fixed32)
    }
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            3 => Ok(Self::StartGroup),
            4 => Ok(Self::EndGroup),
            5 => Ok(Self::Fixed32),
            other => Err(Error::InvalidWireType(other)),
        }
    }
}

/// A field number paired with a wire type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    number: u32,
    wire_type: WireType,
}

impl Tag {
    /// Creates a new tag.
    ///
    /// Panics if `number` is 0 or larger than [MAX_FIELD_NUMBER].
    pub const fn new(number: u32, wire_type: WireType) -> Self {
        assert!(
            number >= 1 && number <= MAX_FIELD_NUMBER,
            "field number out of range"
        );
        Self { number, wire_type }
    }

    /// Parses a tag from its raw varint value.
    pub fn from_raw(raw: u64) -> Result<Self, Error> {
        if raw > u32::MAX as u64 {
            return Err(Error::InvalidTag(raw));
        }
        let number = (raw >> WIRE_TYPE_BITS) as u32;
        if number == 0 {
            return Err(Error::InvalidTag(raw));
        }
        let wire_type = WireType::try_from((raw & WIRE_TYPE_MASK) as u8)?;
        Ok(Self { number, wire_type })
    }

    /// Returns the field number.
    pub const fn number(self) -> u32 {
        self.number
    }

    /// Returns the wire type.
    pub const fn wire_type(self) -> WireType {
        self.wire_type
    }

    /// Returns the raw value written to the wire.
    pub const fn raw(self) -> u32 {
        (self.number << WIRE_TYPE_BITS) | self.wire_type as u32
    }

    /// Returns the encoded size of a tag for `number` (independent of wire type).
    pub fn size(number: u32) -> usize {
        varint::size(number << WIRE_TYPE_BITS)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.number, self.wire_type)
    }
}

impl Write for Tag {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        varint::write(self.raw(), buf);
    }
}

impl EncodeSize for Tag {
    #[inline]
    fn encode_size(&self) -> usize {
        varint::size(self.raw())
    }
}

impl Read for Tag {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Self::from_raw(varint::read(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Decode, Encode};

    #[test]
    fn test_tag_round_trip() {
        for (number, wire_type) in [
            (1, WireType::Varint),
            (15, WireType::LengthDelimited),
            (16, WireType::Fixed32),
            (2048, WireType::StartGroup),
            (MAX_FIELD_NUMBER, WireType::EndGroup),
        ] {
            let tag = Tag::new(number, wire_type);
            let encoded = tag.encode();
            assert_eq!(encoded.len(), Tag::size(number));
            assert_eq!(Tag::decode(encoded).unwrap(), tag);
        }
    }

    #[test]
    fn test_tag_known_bytes() {
        assert_eq!(&Tag::new(1, WireType::Varint).encode()[..], &[0x08]);
        assert_eq!(&Tag::new(2, WireType::LengthDelimited).encode()[..], &[0x12]);
        assert_eq!(&Tag::new(16, WireType::Varint).encode()[..], &[0x80, 0x01]);
    }

    #[test]
    fn test_invalid_tags() {
        // Field number zero.
        assert_eq!(Tag::from_raw(0), Err(Error::InvalidTag(0)));
        assert_eq!(Tag::from_raw(2), Err(Error::InvalidTag(2)));

        // Reserved wire types.
        assert_eq!(Tag::from_raw(0x0E), Err(Error::InvalidWireType(6)));
        assert_eq!(Tag::from_raw(0x0F), Err(Error::InvalidWireType(7)));

        // Larger than 32 bits.
        assert_eq!(
            Tag::from_raw(1 << 32 | 8),
            Err(Error::InvalidTag(1 << 32 | 8))
        );
    }

    #[test]
    #[should_panic(expected = "field number out of range")]
    fn test_zero_field_number_panics() {
        Tag::new(0, WireType::Varint);
    }

    #[test]
    fn test_packable() {
        assert!(WireType::Varint.is_packable());
        assert!(WireType::Fixed32.is_packable());
        assert!(WireType::Fixed64.is_packable());
        assert!(!WireType::LengthDelimited.is_packable());
        assert!(!WireType::StartGroup.is_packable());
    }
}
