//! Variable-length integer encoding and decoding
//!
//! Each byte uses:
//! - 7 bits for the value
//! - 1 "continuation" bit to indicate if more bytes follow
//!
//! Groups are written least-significant first. A 64-bit value needs at most
//! [MAX_VARINT_LEN] bytes.
//!
//! Decoding is deliberately lenient about the final byte: bits beyond the width of the target
//! type are accepted and discarded (as other implementations of the format do), so a 32-bit field
//! encoded as a sign-extended 10-byte varint still decodes.

use crate::{EncodeSize, Error, Read, Write};
use bytes::{Buf, BufMut};
use std::ops::{BitOrAssign, Shl, ShrAssign};

const DATA_BITS_PER_BYTE: usize = 7;
const DATA_BITS_MASK: u8 = 0x7F;
const CONTINUATION_BIT_MASK: u8 = 0x80;

/// The maximum number of bytes a varint may occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// A trait for unsigned integers that can be varint encoded.
pub trait UInt:
    Copy
    + From<u8>
    + Sized
    + ShrAssign<usize>
    + Shl<usize, Output = Self>
    + BitOrAssign<Self>
    + PartialOrd
{
    /// Returns the number of leading zeros in the integer.
    fn leading_zeros(self) -> u32;

    /// Returns the least significant byte of the integer.
    fn as_u8(self) -> u8;
}

// Implements the `UInt` trait for all unsigned integer types.
macro_rules! impl_uint {
    ($type:ty) => {
        impl UInt for $type {
            #[inline]
            fn leading_zeros(self) -> u32 {
                self.leading_zeros()
            }

            #[inline]
            fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}
impl_uint!(u8);
impl_uint!(u16);
impl_uint!(u32);
impl_uint!(u64);

/// A trait for signed integers that can be converted to and from unsigned integers of the
/// equivalent size.
///
/// When converted to unsigned integers, the encoding is done using ZigZag encoding, which moves the
/// sign bit to the least significant bit (shifting all other bits to the left by one). This allows
/// for more efficient encoding of numbers that are close to zero, even if they are negative.
pub trait SInt<UEq: UInt> {
    /// Converts the signed integer to an unsigned integer using ZigZag encoding.
    fn as_zigzag(&self) -> UEq;

    /// Converts a (ZigZag'ed) unsigned integer back to a signed integer.
    fn un_zigzag(value: UEq) -> Self;
}

// Implements the `SInt` trait for all signed integer types.
macro_rules! impl_sint {
    ($type:ty, $utype:ty) => {
        impl SInt<$utype> for $type {
            #[inline]
            fn as_zigzag(&self) -> $utype {
                let shr = std::mem::size_of::<$utype>() * 8 - 1;
                ((self << 1) ^ (self >> shr)) as $utype
            }
            #[inline]
            fn un_zigzag(value: $utype) -> Self {
                ((value >> 1) as $type) ^ (-((value & 1) as $type))
            }
        }
    };
}
impl_sint!(i32, u32);
impl_sint!(i64, u64);

/// Encodes an unsigned integer as a varint.
pub fn write<T: UInt>(value: T, buf: &mut impl BufMut) {
    let continuation_threshold = T::from(CONTINUATION_BIT_MASK);
    if value < continuation_threshold {
        // Fast path for small values (common case for tags and lengths).
        buf.put_u8(value.as_u8());
        return;
    }

    let mut val = value;
    while val >= continuation_threshold {
        buf.put_u8((val.as_u8()) | CONTINUATION_BIT_MASK);
        val >>= 7;
    }
    buf.put_u8(val.as_u8());
}

/// Encodes a signed 32-bit integer the way `int32` fields are encoded: negative values are
/// sign-extended to 64 bits and therefore always occupy [MAX_VARINT_LEN] bytes.
pub fn write_i32(value: i32, buf: &mut impl BufMut) {
    write(value as i64 as u64, buf);
}

/// Decodes a varint from a contiguous slice starting at `offset`.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode(data: &[u8], offset: usize) -> Result<(u64, usize), Error> {
    let input = data.get(offset..).ok_or(Error::MalformedVarint)?;

    // Fast path for single-byte values.
    match input.first() {
        None => return Err(Error::MalformedVarint),
        Some(&byte) if byte & CONTINUATION_BIT_MASK == 0 => return Ok((byte as u64, 1)),
        Some(_) => {}
    }

    let mut result = 0u64;
    for (i, &byte) in input.iter().take(MAX_VARINT_LEN).enumerate() {
        // Bits shifted beyond the 64th are discarded.
        result |= u64::from(byte & DATA_BITS_MASK) << (i * DATA_BITS_PER_BYTE);
        if byte & CONTINUATION_BIT_MASK == 0 {
            return Ok((result, i + 1));
        }
    }
    Err(Error::MalformedVarint)
}

/// Decodes a varint from a buffer.
///
/// Fails with [Error::MalformedVarint] if the buffer is exhausted before a terminating byte or if
/// no terminating byte appears within [MAX_VARINT_LEN] bytes.
pub fn read(buf: &mut impl Buf) -> Result<u64, Error> {
    read_bounded(buf, usize::MAX)
}

/// Decodes a varint from a buffer, reading no more than `available` bytes.
pub(crate) fn read_bounded(buf: &mut impl Buf, available: usize) -> Result<u64, Error> {
    let available = available.min(buf.remaining());

    // If the current chunk holds the whole varint, decode it in place.
    let chunk = buf.chunk();
    let window = &chunk[..chunk.len().min(available)];
    if window.len() >= MAX_VARINT_LEN || window.len() == available {
        let (value, consumed) = decode(window, 0)?;
        buf.advance(consumed);
        return Ok(value);
    }

    // Otherwise, the varint may straddle chunks.
    let mut result = 0u64;
    for i in 0..MAX_VARINT_LEN.min(available) {
        let byte = buf.get_u8();
        result |= u64::from(byte & DATA_BITS_MASK) << (i * DATA_BITS_PER_BYTE);
        if byte & CONTINUATION_BIT_MASK == 0 {
            return Ok(result);
        }
    }
    Err(Error::MalformedVarint)
}

/// Calculates the number of bytes needed to encode an unsigned integer as a varint.
pub fn size<T: UInt>(value: T) -> usize {
    let total_bits = std::mem::size_of::<T>() * 8;
    let leading_zeros = value.leading_zeros() as usize;
    let data_bits = total_bits - leading_zeros;
    usize::max(1, data_bits.div_ceil(DATA_BITS_PER_BYTE))
}

/// Calculates the number of bytes [write_i32] emits.
pub fn size_i32(value: i32) -> usize {
    if value < 0 {
        MAX_VARINT_LEN
    } else {
        size(value as u32)
    }
}

/// Encodes a signed integer as a varint using ZigZag encoding.
pub fn write_signed<U: UInt, S: SInt<U>>(value: S, buf: &mut impl BufMut) {
    write(value.as_zigzag(), buf);
}

/// Calculates the number of bytes needed to encode a signed integer as a varint.
pub fn size_signed<U: UInt, S: SInt<U>>(value: S) -> usize {
    size(value.as_zigzag())
}

/// An ergonomic wrapper to allow for encoding and decoding of `u64` values as varints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UVar(pub u64);

impl Write for UVar {
    fn write(&self, buf: &mut impl BufMut) {
        write(self.0, buf);
    }
}

impl Read for UVar {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        read(buf).map(UVar)
    }
}

impl EncodeSize for UVar {
    fn encode_size(&self) -> usize {
        size(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, Decode, Encode};
    use bytes::Bytes;
    use test_case::test_case;

    #[test]
    fn test_varint_encoding() {
        let test_cases = [
            0u64,
            1,
            127,
            128,
            129,
            0xFF,
            0x100,
            0x3FFF,
            0x4000,
            0x1FFFFF,
            0xFFFFFF,
            0x1FFFFFFF,
            0xFFFFFFFF,
            0x1FFFFFFFFFF,
            0xFFFFFFFFFFFFFF,
            u64::MAX,
        ];

        for &value in &test_cases {
            let mut buf = Vec::new();
            write(value, &mut buf);

            assert_eq!(buf.len(), size(value));

            let mut read_buf = &buf[..];
            let decoded = read(&mut read_buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(read_buf.len(), 0);

            assert_eq!(decode(&buf, 0).unwrap(), (value, buf.len()));
        }
    }

    #[test]
    fn test_zigzag_encoding() {
        let test_cases = [
            0i64,
            1,
            -1,
            2,
            -2,
            127,
            -127,
            128,
            -128,
            0x7FFFFFFF,
            -0x7FFFFFFF,
            i64::MIN,
            i64::MAX,
        ];

        for &value in &test_cases {
            let mut buf = Vec::new();
            write_signed(value, &mut buf);
            assert_eq!(buf.len(), size_signed(value));

            let decoded = read(&mut &buf[..]).unwrap();
            assert_eq!(i64::un_zigzag(decoded), value);
        }
    }

    #[test_case(0, &[0x00]; "zero")]
    #[test_case(-1, &[0x01]; "minus one")]
    #[test_case(1, &[0x02]; "one")]
    #[test_case(-2, &[0x03]; "minus two")]
    #[test_case(i32::MAX, &[0xFE, 0xFF, 0xFF, 0xFF, 0x0F]; "max")]
    #[test_case(i32::MIN, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]; "min")]
    fn test_zigzag32(value: i32, expected: &[u8]) {
        let mut buf = Vec::new();
        write_signed(value, &mut buf);
        assert_eq!(buf, expected);
        assert_eq!(i32::un_zigzag(read(&mut &buf[..]).unwrap() as u32), value);
    }

    #[test]
    fn test_negative_int32_is_sign_extended() {
        let mut buf = Vec::new();
        write_i32(-1, &mut buf);
        assert_eq!(buf.len(), MAX_VARINT_LEN);
        assert_eq!(size_i32(-1), MAX_VARINT_LEN);
        assert_eq!(read(&mut &buf[..]).unwrap() as i32, -1);
    }

    #[test]
    fn test_varint_insufficient_buffer() {
        let mut buf = Bytes::from_static(&[0x80]);
        assert!(matches!(read(&mut buf), Err(Error::MalformedVarint)));
        assert!(matches!(decode(&[0x80, 0x80], 0), Err(Error::MalformedVarint)));
        assert!(matches!(decode(&[], 0), Err(Error::MalformedVarint)));
        assert!(matches!(decode(&[0x01], 2), Err(Error::MalformedVarint)));
    }

    #[test]
    fn test_varint_too_long() {
        let buf = [0x80u8; 11];
        assert!(matches!(read(&mut &buf[..]), Err(Error::MalformedVarint)));
        assert!(matches!(decode(&buf, 0), Err(Error::MalformedVarint)));
    }

    #[test]
    fn test_varint_spurious_high_bits_accepted() {
        // The tenth byte may carry bits beyond the 64th; they are discarded.
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(read(&mut &buf[..]).unwrap(), u64::MAX);

        // A 32-bit value with junk in the upper bytes truncates to its low 32 bits.
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(read(&mut &buf[..]).unwrap() as u32, u32::MAX);
    }

    #[test]
    fn test_varint_across_chunks() {
        let mut encoded = Vec::new();
        write(u64::MAX - 1, &mut encoded);
        for split in 0..=encoded.len() {
            let first = Bytes::copy_from_slice(&encoded[..split]);
            let second = Bytes::copy_from_slice(&encoded[split..]);
            let mut chained = first.chain(second);
            assert_eq!(read(&mut chained).unwrap(), u64::MAX - 1);
        }
    }

    #[test]
    fn test_uvar_codec() {
        let encoded = UVar(300).encode();
        assert_eq!(&encoded[..], &[0xAC, 0x02]);
        assert_eq!(UVar::decode(encoded).unwrap(), UVar(300));
    }
}
