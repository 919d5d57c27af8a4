//! Cursor operations over a contiguous buffer.
//!
//! Each function takes the input (already cut at the current limit) and a position, stores what
//! it read in a [Registers], and returns the position after the value. No function reads at or
//! beyond `data.len()`, so nested limits are applied by slicing.
//!
//! Every operation fails exactly as its counterpart on [crate::reader::Reader] does for the same
//! input and limit.

use crate::{
    tag::{Tag, WireType},
    varint, Error, DEFAULT_RECURSION_LIMIT, MAX_LENGTH,
};
use bytes::Bytes;

/// Values produced by the most recent decode, plus the nesting state of the decode.
#[derive(Clone, Debug)]
pub struct Registers {
    /// The last varint or fixed-width value.
    pub value: u64,
    /// The last length prefix.
    pub len: usize,
    /// The last length-delimited payload.
    pub bytes: Bytes,
    /// The number of open groups and sub-messages.
    pub depth: usize,
    /// The maximum value of `depth`.
    pub recursion_limit: usize,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(DEFAULT_RECURSION_LIMIT)
    }
}

impl Registers {
    /// Creates registers for a decode allowing `recursion_limit` levels of nesting.
    pub fn new(recursion_limit: usize) -> Self {
        Self {
            value: 0,
            len: 0,
            bytes: Bytes::new(),
            depth: 0,
            recursion_limit,
        }
    }

    /// Opens a group or sub-message.
    pub fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= self.recursion_limit {
            return Err(Error::RecursionLimitExceeded(self.recursion_limit));
        }
        self.depth += 1;
        Ok(())
    }

    /// Closes a group or sub-message.
    pub fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Decodes a tag at `pos`. The caller checks for the end of input first.
#[inline]
pub fn decode_tag(data: &[u8], pos: usize) -> Result<(Tag, usize), Error> {
    let (raw, consumed) = varint::decode(data, pos)?;
    Ok((Tag::from_raw(raw)?, pos + consumed))
}

/// Decodes a varint into `regs.value`.
#[inline]
pub fn decode_varint(data: &[u8], pos: usize, regs: &mut Registers) -> Result<usize, Error> {
    let (value, consumed) = varint::decode(data, pos)?;
    regs.value = value;
    Ok(pos + consumed)
}

/// Decodes 4 little-endian bytes into `regs.value`.
#[inline]
pub fn decode_fixed32(data: &[u8], pos: usize, regs: &mut Registers) -> Result<usize, Error> {
    let end = pos + 4;
    let bytes = data.get(pos..end).ok_or(Error::TruncatedMessage)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    regs.value = u32::from_le_bytes(word) as u64;
    Ok(end)
}

/// Decodes 8 little-endian bytes into `regs.value`.
#[inline]
pub fn decode_fixed64(data: &[u8], pos: usize, regs: &mut Registers) -> Result<usize, Error> {
    let end = pos + 8;
    let bytes = data.get(pos..end).ok_or(Error::TruncatedMessage)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    regs.value = u64::from_le_bytes(word);
    Ok(end)
}

/// Decodes a length prefix into `regs.len`, checking that the payload fits before the end of
/// `data`.
pub fn decode_length(data: &[u8], pos: usize, regs: &mut Registers) -> Result<usize, Error> {
    let (len, consumed) = varint::decode(data, pos)?;
    if len > MAX_LENGTH {
        return Err(Error::MalformedLength(len));
    }
    let pos = pos + consumed;
    let len = len as usize;
    if len > data.len() - pos {
        return Err(Error::TruncatedMessage);
    }
    regs.len = len;
    Ok(pos)
}

/// Decodes a length-delimited payload of `owner[..limit]` into `regs.bytes`, sharing `owner`'s
/// storage.
pub fn decode_bytes(
    owner: &Bytes,
    limit: usize,
    pos: usize,
    regs: &mut Registers,
) -> Result<usize, Error> {
    let pos = decode_length(&owner[..limit], pos, regs)?;
    let end = pos + regs.len;
    regs.bytes = owner.slice(pos..end);
    Ok(end)
}

/// Skips the payload of a field whose tag ends just before `pos`.
pub fn skip_field(data: &[u8], pos: usize, tag: Tag, regs: &mut Registers) -> Result<usize, Error> {
    match tag.wire_type() {
        WireType::Varint => decode_varint(data, pos, regs),
        WireType::Fixed64 => decode_fixed64(data, pos, regs),
        WireType::Fixed32 => decode_fixed32(data, pos, regs),
        WireType::LengthDelimited => {
            let pos = decode_length(data, pos, regs)?;
            Ok(pos + regs.len)
        }
        WireType::StartGroup => {
            regs.enter()?;
            let pos = skip_group(data, pos, tag.number(), regs)?;
            regs.leave();
            Ok(pos)
        }
        WireType::EndGroup => Err(Error::InvalidEndGroup(tag.number())),
    }
}

/// Skips the fields of a group opened with `number`, consuming its END_GROUP tag.
pub fn skip_group(
    data: &[u8],
    mut pos: usize,
    number: u32,
    regs: &mut Registers,
) -> Result<usize, Error> {
    loop {
        if pos == data.len() {
            return Err(Error::UnterminatedGroup(number));
        }
        let (tag, next) = decode_tag(data, pos)?;
        if tag.wire_type() == WireType::EndGroup {
            if tag.number() == number {
                return Ok(next);
            }
            return Err(Error::InvalidEndGroup(tag.number()));
        }
        pos = skip_field(data, next, tag, regs)?;
    }
}
