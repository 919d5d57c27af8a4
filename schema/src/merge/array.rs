//! [Source] over a contiguous buffer, using the array decoders.

use super::Source;
use bytes::Bytes;
use strata_wire::{
    decode::{self, Registers},
    Error, Rope, Tag,
};

/// A cursor over `owner[..limit]`.
pub(crate) struct ArraySource {
    owner: Bytes,
    pos: usize,
    limit: usize,
    regs: Registers,
}

impl ArraySource {
    /// Creates a cursor over all of `owner`, with `depth` groups and sub-messages already open.
    pub(crate) fn new(owner: Bytes, depth: usize, recursion_limit: usize) -> Self {
        let limit = owner.len();
        let mut regs = Registers::new(recursion_limit);
        regs.depth = depth;
        Self {
            owner,
            pos: 0,
            limit,
            regs,
        }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        &self.owner[..self.limit]
    }
}

impl Source for ArraySource {
    #[inline]
    fn read_tag(&mut self) -> Result<Option<Tag>, Error> {
        if self.pos >= self.limit {
            return Ok(None);
        }
        let (tag, pos) = decode::decode_tag(self.data(), self.pos)?;
        self.pos = pos;
        Ok(Some(tag))
    }

    #[inline]
    fn read_varint(&mut self) -> Result<u64, Error> {
        let limit = self.limit;
        self.pos = decode::decode_varint(&self.owner[..limit], self.pos, &mut self.regs)?;
        Ok(self.regs.value)
    }

    #[inline]
    fn read_fixed32(&mut self) -> Result<u32, Error> {
        let limit = self.limit;
        self.pos = decode::decode_fixed32(&self.owner[..limit], self.pos, &mut self.regs)?;
        Ok(self.regs.value as u32)
    }

    #[inline]
    fn read_fixed64(&mut self) -> Result<u64, Error> {
        let limit = self.limit;
        self.pos = decode::decode_fixed64(&self.owner[..limit], self.pos, &mut self.regs)?;
        Ok(self.regs.value)
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        let limit = self.limit;
        self.pos = decode::decode_length(&self.owner[..limit], self.pos, &mut self.regs)?;
        Ok(self.regs.len)
    }

    fn read_bytes(&mut self) -> Result<Rope, Error> {
        self.pos = decode::decode_bytes(&self.owner, self.limit, self.pos, &mut self.regs)?;
        Ok(Rope::from(std::mem::take(&mut self.regs.bytes)))
    }

    fn skip_field(&mut self, tag: Tag) -> Result<(), Error> {
        let limit = self.limit;
        self.pos = decode::skip_field(&self.owner[..limit], self.pos, tag, &mut self.regs)?;
        Ok(())
    }

    fn push_limit(&mut self, len: usize) -> Result<usize, Error> {
        if len > self.limit - self.pos {
            return Err(Error::TruncatedMessage);
        }
        let previous = self.limit;
        self.limit = self.pos + len;
        Ok(previous)
    }

    fn pop_limit(&mut self, previous: usize) {
        self.limit = previous;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.limit
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.regs.enter()
    }

    fn leave(&mut self) {
        self.regs.leave()
    }

    fn depth(&self) -> usize {
        self.regs.depth
    }
}
