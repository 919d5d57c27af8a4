//! Size computation and serialization.
//!
//! Serialization runs in two passes: sizes are computed first (and memoized per message) so that
//! every length prefix is known before it is written, then the fields are written in number
//! order (regular fields and extensions interleaved) followed by the unknown fields.

use crate::{
    message::{Message, MessageData},
    schema::{FieldInfo, FieldType, MapEntry},
    value::{FieldValue, Value},
};
use bytes::{BufMut, Bytes, BytesMut};
use std::num::NonZeroUsize;
use strata_wire::{
    varint,
    writer::{self, length_delimited_size, tag_size, ChunkedSink},
    EncodeSize, WireType, Write,
};

impl MessageData {
    /// Returns the serialized size, computing it if it is not memoized.
    pub(crate) fn encoded_len(&self) -> usize {
        if let Some(size) = self.cached_size() {
            return size;
        }
        let fields: usize = self
            .entries()
            .map(|(field, value)| field_len(field, value))
            .sum();
        let size = fields + self.unknown.encoded_len();
        self.cache_size(size);
        size
    }

    /// Writes every field in number order, then the unknown fields.
    pub(crate) fn write(&self, buf: &mut impl BufMut) {
        for (field, value) in self.entries() {
            write_field(buf, field, value);
        }
        self.unknown.write(buf);
    }

    /// Iterates over set fields and extensions in number order.
    fn entries(&self) -> impl Iterator<Item = (&FieldInfo, &FieldValue)> + '_ {
        let mut fields = self
            .schema
            .fields()
            .iter()
            .zip(&self.fields)
            .filter_map(|(field, slot)| Some((field, slot.as_ref()?)))
            .peekable();
        let mut extensions = self
            .extensions
            .values()
            .map(|extension| (extension.extension.field(), &extension.value))
            .peekable();
        std::iter::from_fn(move || match (fields.peek(), extensions.peek()) {
            (Some((a, _)), Some((b, _))) if b.number() < a.number() => extensions.next(),
            (Some(_), _) => fields.next(),
            (None, _) => extensions.next(),
        })
    }
}

fn field_len(field: &FieldInfo, value: &FieldValue) -> usize {
    let number = field.number();
    let ty = field.field_type();
    match value {
        FieldValue::Singular(value) => {
            if !field.has_presence() && value.is_zero() {
                return 0;
            }
            tag_size(number) + payload_len(number, ty, value)
        }
        FieldValue::Lazy(lazy) => tag_size(number) + length_delimited_size(lazy.encoded_len()),
        FieldValue::Repeated(values) if values.is_empty() => 0,
        FieldValue::Repeated(values) if field.is_packed() => {
            let payload = values
                .iter()
                .map(|value| payload_len(number, ty, value))
                .sum();
            tag_size(number) + length_delimited_size(payload)
        }
        FieldValue::Repeated(values) => values
            .iter()
            .map(|value| tag_size(number) + payload_len(number, ty, value))
            .sum(),
        FieldValue::Map(entries) => {
            let Some(entry) = field.map_entry() else {
                return 0;
            };
            entries
                .iter()
                .map(|(key, value)| {
                    let len = entry_len(entry, &key.to_value(), value);
                    tag_size(number) + length_delimited_size(len)
                })
                .sum()
        }
    }
}

/// Returns the size of a value without its tag. Groups include their END_GROUP tag.
fn payload_len(number: u32, ty: FieldType, value: &Value) -> usize {
    use FieldType as T;
    match (ty, value) {
        (T::Fixed32 | T::Sfixed32 | T::Float, _) => 4,
        (T::Fixed64 | T::Sfixed64 | T::Double, _) => 8,
        (_, Value::Bool(_)) => 1,
        (T::Sint32, Value::I32(v)) => varint::size_signed(*v),
        (_, Value::I32(v) | Value::Enum(v)) => varint::size_i32(*v),
        (T::Sint64, Value::I64(v)) => varint::size_signed(*v),
        (_, Value::I64(v)) => varint::size(*v as u64),
        (_, Value::U32(v)) => varint::size(*v),
        (_, Value::U64(v)) => varint::size(*v),
        (_, Value::String(bytes) | Value::Bytes(bytes)) => length_delimited_size(bytes.len()),
        (T::Group, Value::Message(message)) => message.encoded_len() + tag_size(number),
        (_, Value::Message(message)) => length_delimited_size(message.encoded_len()),
        (_, Value::F32(_) | Value::F64(_)) => 0,
    }
}

fn write_field(buf: &mut impl BufMut, field: &FieldInfo, value: &FieldValue) {
    let number = field.number();
    let ty = field.field_type();
    match value {
        FieldValue::Singular(value) => {
            if field.has_presence() || !value.is_zero() {
                write_tagged(buf, number, ty, value);
            }
        }
        FieldValue::Lazy(lazy) => {
            writer::write_tag(buf, number, WireType::LengthDelimited);
            writer::write_length(buf, lazy.encoded_len());
            lazy.write(buf);
        }
        FieldValue::Repeated(values) if values.is_empty() => {}
        FieldValue::Repeated(values) if field.is_packed() => {
            let payload = values
                .iter()
                .map(|value| payload_len(number, ty, value))
                .sum();
            writer::write_tag(buf, number, WireType::LengthDelimited);
            writer::write_length(buf, payload);
            for value in values {
                write_payload(buf, number, ty, value);
            }
        }
        FieldValue::Repeated(values) => {
            for value in values {
                write_tagged(buf, number, ty, value);
            }
        }
        FieldValue::Map(entries) => {
            let Some(entry) = field.map_entry() else {
                return;
            };
            for (key, value) in entries {
                let key = key.to_value();
                writer::write_tag(buf, number, WireType::LengthDelimited);
                writer::write_length(buf, entry_len(entry, &key, value));
                write_tagged(buf, 1, entry.key, &key);
                write_tagged(buf, 2, entry.value, value);
            }
        }
    }
}

fn entry_len(entry: MapEntry, key: &Value, value: &Value) -> usize {
    tag_size(1) + payload_len(1, entry.key, key) + tag_size(2) + payload_len(2, entry.value, value)
}

fn write_tagged(buf: &mut impl BufMut, number: u32, ty: FieldType, value: &Value) {
    writer::write_tag(buf, number, ty.wire_type());
    write_payload(buf, number, ty, value);
}

/// Writes a value without its tag. Groups are closed with their END_GROUP tag.
fn write_payload(buf: &mut impl BufMut, number: u32, ty: FieldType, value: &Value) {
    use FieldType as T;
    match (ty, value) {
        (T::Float, Value::F32(v)) => writer::write_fixed32(buf, v.to_bits()),
        (T::Double, Value::F64(v)) => writer::write_fixed64(buf, v.to_bits()),
        (T::Fixed32, Value::U32(v)) => writer::write_fixed32(buf, *v),
        (T::Sfixed32, Value::I32(v)) => writer::write_fixed32(buf, *v as u32),
        (T::Fixed64, Value::U64(v)) => writer::write_fixed64(buf, *v),
        (T::Sfixed64, Value::I64(v)) => writer::write_fixed64(buf, *v as u64),
        (_, Value::Bool(v)) => buf.put_u8(u8::from(*v)),
        (T::Sint32, Value::I32(v)) => varint::write_signed(*v, buf),
        (_, Value::I32(v) | Value::Enum(v)) => varint::write_i32(*v, buf),
        (T::Sint64, Value::I64(v)) => varint::write_signed(*v, buf),
        (_, Value::I64(v)) => varint::write(*v as u64, buf),
        (_, Value::U32(v)) => varint::write(*v, buf),
        (_, Value::U64(v)) => varint::write(*v, buf),
        (_, Value::String(bytes) | Value::Bytes(bytes)) => {
            writer::write_length(buf, bytes.len());
            writer::write_rope(buf, bytes);
        }
        (T::Group, Value::Message(message)) => {
            message.write_to(buf);
            writer::write_tag(buf, number, WireType::EndGroup);
        }
        (_, Value::Message(message)) => {
            writer::write_length(buf, message.encoded_len());
            message.write_to(buf);
        }
        _ => {}
    }
}

impl Message {
    /// Returns the serialized size of the message.
    pub fn encoded_len(&self) -> usize {
        self.data.encoded_len()
    }

    /// Writes the serialized message.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        self.data.write(buf);
    }

    /// Serializes the message into a single buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Serializes the message into buffers of `chunk_size` bytes (the last may be shorter).
    ///
    /// The concatenation of the chunks equals [Message::to_bytes].
    pub fn encode_chunked(&self, chunk_size: NonZeroUsize) -> Vec<Bytes> {
        let mut sink = ChunkedSink::new(chunk_size);
        self.write_to(&mut sink);
        sink.into_chunks()
    }

    /// Writes the message preceded by its length as a varint.
    pub fn write_delimited(&self, buf: &mut impl BufMut) {
        writer::write_length(buf, self.encoded_len());
        self.write_to(buf);
    }
}

impl Write for Message {
    fn write(&self, buf: &mut impl BufMut) {
        self.write_to(buf);
    }
}

impl EncodeSize for Message {
    fn encode_size(&self) -> usize {
        self.encoded_len()
    }
}
