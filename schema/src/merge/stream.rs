//! [Source] over the stream cursor.

use super::Source;
use bytes::Buf;
use strata_wire::{reader::Reader, Error, Rope, Tag};

impl<B: Buf> Source for Reader<B> {
    #[inline]
    fn read_tag(&mut self) -> Result<Option<Tag>, Error> {
        Reader::read_tag(self)
    }

    #[inline]
    fn read_varint(&mut self) -> Result<u64, Error> {
        Reader::read_varint(self)
    }

    #[inline]
    fn read_fixed32(&mut self) -> Result<u32, Error> {
        Reader::read_fixed32(self)
    }

    #[inline]
    fn read_fixed64(&mut self) -> Result<u64, Error> {
        Reader::read_fixed64(self)
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        Reader::read_length(self)
    }

    fn read_bytes(&mut self) -> Result<Rope, Error> {
        Reader::read_bytes(self)
    }

    fn skip_field(&mut self, tag: Tag) -> Result<(), Error> {
        Reader::skip_field(self, tag)
    }

    fn push_limit(&mut self, len: usize) -> Result<usize, Error> {
        Reader::push_limit(self, len)
    }

    fn pop_limit(&mut self, previous: usize) {
        Reader::pop_limit(self, previous)
    }

    fn is_at_end(&self) -> bool {
        Reader::is_at_end(self)
    }

    fn enter(&mut self) -> Result<(), Error> {
        Reader::enter(self)
    }

    fn leave(&mut self) {
        Reader::leave(self)
    }

    fn depth(&self) -> usize {
        Reader::depth(self)
    }
}
