//! Storage for fields a message does not recognize.
//!
//! Unrecognized fields are kept in the order they were read, so a message that is parsed and
//! serialized without modification reproduces them byte for byte.

use bytes::BufMut;
use strata_wire::{
    varint,
    writer::{self, length_delimited_size, tag_size},
    Rope, WireType,
};

/// The payload of an unrecognized field.
#[derive(Clone, Debug, PartialEq)]
pub enum UnknownValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(Rope),
    Group(UnknownFieldSet),
}

impl UnknownValue {
    /// Returns the wire type the value was read with.
    pub fn wire_type(&self) -> WireType {
        match self {
            UnknownValue::Varint(_) => WireType::Varint,
            UnknownValue::Fixed32(_) => WireType::Fixed32,
            UnknownValue::Fixed64(_) => WireType::Fixed64,
            UnknownValue::LengthDelimited(_) => WireType::LengthDelimited,
            UnknownValue::Group(_) => WireType::StartGroup,
        }
    }

    fn encoded_len(&self, number: u32) -> usize {
        let payload = match self {
            UnknownValue::Varint(value) => varint::size(*value),
            UnknownValue::Fixed32(_) => 4,
            UnknownValue::Fixed64(_) => 8,
            UnknownValue::LengthDelimited(bytes) => length_delimited_size(bytes.len()),
            UnknownValue::Group(group) => group.encoded_len() + tag_size(number),
        };
        tag_size(number) + payload
    }

    fn write(&self, number: u32, buf: &mut impl BufMut) {
        writer::write_tag(buf, number, self.wire_type());
        match self {
            UnknownValue::Varint(value) => varint::write(*value, buf),
            UnknownValue::Fixed32(value) => writer::write_fixed32(buf, *value),
            UnknownValue::Fixed64(value) => writer::write_fixed64(buf, *value),
            UnknownValue::LengthDelimited(bytes) => {
                writer::write_length(buf, bytes.len());
                writer::write_rope(buf, bytes);
            }
            UnknownValue::Group(group) => {
                group.write(buf);
                writer::write_tag(buf, number, WireType::EndGroup);
            }
        }
    }
}

/// An ordered collection of unrecognized fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnknownFieldSet {
    fields: Vec<(u32, UnknownValue)>,
}

impl UnknownFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of stored values (a field seen twice counts twice).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Appends a value for field `number`.
    pub fn push(&mut self, number: u32, value: UnknownValue) {
        self.fields.push((number, value));
    }

    /// Returns the values stored for field `number`, in the order they were read.
    pub fn get(&self, number: u32) -> impl Iterator<Item = &UnknownValue> + '_ {
        self.fields
            .iter()
            .filter(move |(n, _)| *n == number)
            .map(|(_, value)| value)
    }

    /// Iterates over all stored fields in the order they were read.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownValue)> + '_ {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    /// Appends every field of `other`.
    pub fn merge_from(&mut self, other: &UnknownFieldSet) {
        self.fields.extend(other.fields.iter().cloned());
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Returns the number of bytes [UnknownFieldSet::write] emits.
    pub fn encoded_len(&self) -> usize {
        self.fields
            .iter()
            .map(|(number, value)| value.encoded_len(*number))
            .sum()
    }

    /// Writes every field in order.
    pub fn write(&self, buf: &mut impl BufMut) {
        for (number, value) in &self.fields {
            value.write(*number, buf);
        }
    }
}
