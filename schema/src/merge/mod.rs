//! Parsing wire-format input into messages.
//!
//! The merge algorithm is written once against [Source] and runs over two cursors: a stream
//! [strata_wire::reader::Reader] for any [Buf] ([merge_buf]) and an array cursor over a contiguous
//! [Bytes] ([merge_bytes]). Both cursors fail identically on identical input, so the two entry
//! points produce the same message or the same error.

mod array;
mod stream;

use crate::{
    config::ParseOptions,
    error::Error,
    extension::Extension,
    lazy::LazyField,
    message::{ExtensionField, Message, MessageData},
    schema::{FieldInfo, FieldType, MapEntry, Schema},
    unknown::{UnknownFieldSet, UnknownValue},
    value::{FieldValue, MapKey, Value},
};
use array::ArraySource;
use bytes::{Buf, Bytes};
use std::{collections::BTreeMap, sync::Arc};
use strata_wire::{reader::Reader, Rope, Tag, WireType};
use tracing::trace;

/// A cursor the merge algorithm reads from.
pub(crate) trait Source {
    fn read_tag(&mut self) -> Result<Option<Tag>, strata_wire::Error>;
    fn read_varint(&mut self) -> Result<u64, strata_wire::Error>;
    fn read_fixed32(&mut self) -> Result<u32, strata_wire::Error>;
    fn read_fixed64(&mut self) -> Result<u64, strata_wire::Error>;

    /// Reads a length prefix whose payload is known to be available.
    fn read_length(&mut self) -> Result<usize, strata_wire::Error>;

    /// Reads a length-delimited payload.
    fn read_bytes(&mut self) -> Result<Rope, strata_wire::Error>;

    fn skip_field(&mut self, tag: Tag) -> Result<(), strata_wire::Error>;
    fn push_limit(&mut self, len: usize) -> Result<usize, strata_wire::Error>;
    fn pop_limit(&mut self, previous: usize);
    fn is_at_end(&self) -> bool;
    fn enter(&mut self) -> Result<(), strata_wire::Error>;
    fn leave(&mut self);
    fn depth(&self) -> usize;
}

/// Parses `bytes` into `data`. Length-delimited values share `bytes`' storage.
pub(crate) fn merge_bytes(
    data: &mut MessageData,
    bytes: &Bytes,
    options: &ParseOptions,
) -> Result<(), Error> {
    check_size(bytes.len(), options)?;
    let mut source = ArraySource::new(bytes.clone(), 0, options.recursion_limit);
    merge_message(&mut source, data, options, None)
}

/// Parses all of `buf` into `data`.
pub(crate) fn merge_buf(
    data: &mut MessageData,
    buf: impl Buf,
    options: &ParseOptions,
) -> Result<(), Error> {
    check_size(buf.remaining(), options)?;
    let mut reader = Reader::with_recursion_limit(buf, options.recursion_limit);
    merge_message(&mut reader, data, options, None)
}

fn check_size(len: usize, options: &ParseOptions) -> Result<(), Error> {
    if len > options.size_limit {
        return Err(strata_wire::Error::SizeLimitExceeded(len, options.size_limit).into());
    }
    Ok(())
}

/// Merges fields up to the current limit or, for a group, up to its END_GROUP tag.
fn merge_message<S: Source>(
    src: &mut S,
    data: &mut MessageData,
    options: &ParseOptions,
    group: Option<u32>,
) -> Result<(), Error> {
    data.invalidate();
    loop {
        let Some(tag) = src.read_tag()? else {
            return match group {
                Some(number) => Err(strata_wire::Error::UnterminatedGroup(number).into()),
                None => Ok(()),
            };
        };
        if tag.wire_type() == WireType::EndGroup {
            return match group {
                Some(number) if number == tag.number() => Ok(()),
                _ => Err(strata_wire::Error::InvalidEndGroup(tag.number()).into()),
            };
        }
        merge_field(src, data, options, tag)?;
    }
}

fn merge_field<S: Source>(
    src: &mut S,
    data: &mut MessageData,
    options: &ParseOptions,
    tag: Tag,
) -> Result<(), Error> {
    let schema = data.schema;
    let number = tag.number();
    if let Some(index) = schema.index_of(number) {
        let field = schema.field(index);
        let stored = merge_into(
            src,
            field,
            tag,
            &mut data.fields[index],
            &mut data.unknown,
            options,
        )?;
        if stored {
            data.clear_oneof_siblings(index);
        }
        return Ok(());
    }
    if schema.is_extension(number) {
        let extension = options
            .extensions
            .as_ref()
            .and_then(|lookup| lookup.find_by_number(schema.name(), number));
        if let Some(extension) = extension {
            return merge_extension(src, data, extension, tag, options);
        }
    }
    merge_unknown(src, &mut data.unknown, tag, options)
}

fn merge_extension<S: Source>(
    src: &mut S,
    data: &mut MessageData,
    extension: Arc<Extension>,
    tag: Tag,
    options: &ParseOptions,
) -> Result<(), Error> {
    let number = extension.number();
    let mut slot = data.extensions.remove(&number).map(|stored| stored.value);
    merge_into(src, extension.field(), tag, &mut slot, &mut data.unknown, options)?;
    if let Some(value) = slot {
        data.extensions
            .insert(number, ExtensionField { extension, value });
    }
    Ok(())
}

/// Merges one occurrence of `field` into `slot`, returning whether the slot was set.
///
/// Values a closed enum does not declare, and values sent with the wrong wire type, are stored in
/// `unknown` instead.
fn merge_into<S: Source>(
    src: &mut S,
    field: &FieldInfo,
    tag: Tag,
    slot: &mut Option<FieldValue>,
    unknown: &mut UnknownFieldSet,
    options: &ParseOptions,
) -> Result<bool, Error> {
    let ty = field.field_type();
    let wire_type = tag.wire_type();

    if let Some(entry) = field.map_entry() {
        if wire_type != WireType::LengthDelimited {
            merge_unknown(src, unknown, tag, options)?;
            return Ok(false);
        }
        return merge_map_entry(src, field, entry, tag, slot, unknown, options);
    }

    if field.is_repeated() {
        if wire_type == WireType::LengthDelimited && ty.is_packable() {
            merge_packed(src, field, tag, slot, unknown, options)?;
            return Ok(true);
        }
        if wire_type != ty.wire_type() {
            merge_unknown(src, unknown, tag, options)?;
            return Ok(false);
        }
        let value = match ty {
            FieldType::Message | FieldType::Group => {
                let mut message = Message::empty(message_schema(field)?);
                merge_sub_message(src, ty, tag, message.data_mut(), options)?;
                Value::Message(message)
            }
            _ => read_scalar(src, field, ty)?,
        };
        if is_unknown_enum(field, &value) {
            push_unknown_enum(unknown, tag, &value, options);
            return Ok(false);
        }
        match slot {
            Some(FieldValue::Repeated(values)) => values.push(value),
            _ => *slot = Some(FieldValue::Repeated(vec![value])),
        }
        return Ok(true);
    }

    if wire_type != ty.wire_type() {
        merge_unknown(src, unknown, tag, options)?;
        return Ok(false);
    }
    match ty {
        FieldType::Message | FieldType::Group => {
            let schema = message_schema(field)?;
            let deferred = ty == FieldType::Message
                && field.is_lazy()
                && options.lazy
                && !matches!(slot, Some(FieldValue::Singular(_)));
            if deferred {
                let raw = src.read_bytes()?;
                match slot {
                    Some(FieldValue::Lazy(lazy)) => lazy.merge_bytes(&raw)?,
                    _ => {
                        *slot = Some(FieldValue::Lazy(LazyField::from_bytes(
                            schema,
                            raw,
                            options.clone(),
                        )))
                    }
                }
                return Ok(true);
            }
            let mut message = match slot.take() {
                Some(FieldValue::Singular(Value::Message(message))) => message,
                Some(FieldValue::Lazy(lazy)) => lazy.into_message(),
                _ => Message::empty(schema),
            };
            merge_sub_message(src, ty, tag, message.data_mut(), options)?;
            *slot = Some(FieldValue::Singular(Value::Message(message)));
            Ok(true)
        }
        _ => {
            let value = read_scalar(src, field, ty)?;
            if is_unknown_enum(field, &value) {
                push_unknown_enum(unknown, tag, &value, options);
                return Ok(false);
            }
            if !field.has_presence() && value.is_zero() {
                *slot = None;
            } else {
                *slot = Some(FieldValue::Singular(value));
            }
            Ok(true)
        }
    }
}

/// Merges a packed run of scalars.
fn merge_packed<S: Source>(
    src: &mut S,
    field: &FieldInfo,
    tag: Tag,
    slot: &mut Option<FieldValue>,
    unknown: &mut UnknownFieldSet,
    options: &ParseOptions,
) -> Result<(), Error> {
    let ty = field.field_type();
    let len = src.read_length()?;
    let previous = src.push_limit(len)?;
    let mut values = Vec::new();
    while !src.is_at_end() {
        let value = read_scalar(src, field, ty)?;
        if is_unknown_enum(field, &value) {
            push_unknown_enum(unknown, tag, &value, options);
        } else {
            values.push(value);
        }
    }
    src.pop_limit(previous);

    // An empty run leaves an unset field unset.
    match slot {
        Some(FieldValue::Repeated(existing)) => existing.extend(values),
        _ if values.is_empty() => {}
        _ => *slot = Some(FieldValue::Repeated(values)),
    }
    Ok(())
}

/// Parses one map entry.
///
/// The entry is read whole so that an entry whose value a closed enum does not declare can be
/// kept, unchanged, as an unknown field.
fn merge_map_entry<S: Source>(
    src: &mut S,
    field: &FieldInfo,
    entry: MapEntry,
    tag: Tag,
    slot: &mut Option<FieldValue>,
    unknown: &mut UnknownFieldSet,
    options: &ParseOptions,
) -> Result<bool, Error> {
    let raw = src.read_bytes()?;
    let mut entry_src = ArraySource::new(raw.to_bytes(), src.depth(), options.recursion_limit);
    entry_src.enter()?;

    let mut key = None;
    let mut value = None;
    while let Some(inner) = entry_src.read_tag()? {
        let wire_type = inner.wire_type();
        match inner.number() {
            1 if wire_type == entry.key.wire_type() => {
                key = Some(read_scalar(&mut entry_src, field, entry.key)?);
            }
            2 if wire_type == entry.value.wire_type() => {
                value = Some(match entry.value {
                    FieldType::Message => {
                        let mut message = match value.take() {
                            Some(Value::Message(message)) => message,
                            _ => Message::empty(message_schema(field)?),
                        };
                        merge_sub_message(
                            &mut entry_src,
                            entry.value,
                            inner,
                            message.data_mut(),
                            options,
                        )?;
                        Value::Message(message)
                    }
                    ty => read_scalar(&mut entry_src, field, ty)?,
                });
            }
            _ if wire_type == WireType::EndGroup => {
                return Err(strata_wire::Error::InvalidEndGroup(inner.number()).into());
            }
            _ => entry_src.skip_field(inner)?,
        }
    }

    let value = match value {
        Some(value) => value,
        None => match entry.value {
            FieldType::Message => Value::Message(Message::empty(message_schema(field)?)),
            FieldType::Enum => Value::Enum(field.enum_info().map_or(0, |info| info.default_value())),
            ty => Value::zero(ty).unwrap_or(Value::I32(0)),
        },
    };
    if is_unknown_enum(field, &value) {
        if !options.discard_unknown {
            unknown.push(tag.number(), UnknownValue::LengthDelimited(raw));
        }
        return Ok(false);
    }
    let key = key
        .or_else(|| Value::zero(entry.key))
        .and_then(MapKey::from_value)
        .ok_or_else(|| Error::TypeMismatch {
            field: field.name().to_string(),
            expected: "map key",
        })?;
    match slot {
        Some(FieldValue::Map(entries)) => {
            entries.insert(key, value);
        }
        _ => *slot = Some(FieldValue::Map(BTreeMap::from([(key, value)]))),
    }
    Ok(true)
}

/// Merges a length-delimited sub-message or a group into `data`.
fn merge_sub_message<S: Source>(
    src: &mut S,
    ty: FieldType,
    tag: Tag,
    data: &mut MessageData,
    options: &ParseOptions,
) -> Result<(), Error> {
    if ty == FieldType::Group {
        src.enter()?;
        merge_message(src, data, options, Some(tag.number()))?;
        src.leave();
        return Ok(());
    }
    let len = src.read_length()?;
    src.enter()?;
    let previous = src.push_limit(len)?;
    merge_message(src, data, options, None)?;
    src.pop_limit(previous);
    src.leave();
    Ok(())
}

fn message_schema(field: &FieldInfo) -> Result<&'static Schema, Error> {
    let ty = field.message_type().ok_or_else(|| Error::TypeMismatch {
        field: field.name().to_string(),
        expected: "message type",
    })?;
    Ok(ty.schema()?)
}

/// Reads one scalar value of type `ty`.
fn read_scalar<S: Source>(src: &mut S, field: &FieldInfo, ty: FieldType) -> Result<Value, Error> {
    use FieldType as T;
    Ok(match ty {
        T::Double => Value::F64(f64::from_bits(src.read_fixed64()?)),
        T::Float => Value::F32(f32::from_bits(src.read_fixed32()?)),
        T::Int64 => Value::I64(src.read_varint()? as i64),
        T::Uint64 => Value::U64(src.read_varint()?),
        T::Int32 => Value::I32(src.read_varint()? as i32),
        T::Fixed64 => Value::U64(src.read_fixed64()?),
        T::Fixed32 => Value::U32(src.read_fixed32()?),
        T::Bool => Value::Bool(src.read_varint()? != 0),
        T::Uint32 => Value::U32(src.read_varint()? as u32),
        T::Enum => Value::Enum(src.read_varint()? as i32),
        T::Sfixed32 => Value::I32(src.read_fixed32()? as i32),
        T::Sfixed64 => Value::I64(src.read_fixed64()? as i64),
        T::Sint32 => {
            let raw = src.read_varint()? as u32;
            Value::I32((raw >> 1) as i32 ^ -((raw & 1) as i32))
        }
        T::Sint64 => {
            let raw = src.read_varint()?;
            Value::I64((raw >> 1) as i64 ^ -((raw & 1) as i64))
        }
        T::String => {
            let text = src.read_bytes()?;
            if field.is_strict_utf8() && !text.is_valid_utf8() {
                return Err(strata_wire::Error::InvalidUtf8.into());
            }
            Value::String(text)
        }
        T::Bytes => Value::Bytes(src.read_bytes()?),
        T::Message | T::Group => {
            return Err(Error::TypeMismatch {
                field: field.name().to_string(),
                expected: "scalar",
            })
        }
    })
}

fn is_unknown_enum(field: &FieldInfo, value: &Value) -> bool {
    match (value, field.enum_info()) {
        (Value::Enum(number), Some(info)) => !info.accepts(*number),
        _ => false,
    }
}

/// Stores an undeclared closed-enum value as an unknown varint.
fn push_unknown_enum(unknown: &mut UnknownFieldSet, tag: Tag, value: &Value, options: &ParseOptions) {
    if options.discard_unknown {
        return;
    }
    if let Value::Enum(number) = value {
        trace!(number = tag.number(), value = number, "unrecognized enum value");
        unknown.push(tag.number(), UnknownValue::Varint(*number as i64 as u64));
    }
}

fn merge_unknown<S: Source>(
    src: &mut S,
    unknown: &mut UnknownFieldSet,
    tag: Tag,
    options: &ParseOptions,
) -> Result<(), Error> {
    if options.discard_unknown {
        src.skip_field(tag)?;
        return Ok(());
    }
    let value = read_unknown(src, tag)?;
    trace!(number = tag.number(), wire_type = ?tag.wire_type(), "captured unknown field");
    unknown.push(tag.number(), value);
    Ok(())
}

fn read_unknown<S: Source>(src: &mut S, tag: Tag) -> Result<UnknownValue, Error> {
    Ok(match tag.wire_type() {
        WireType::Varint => UnknownValue::Varint(src.read_varint()?),
        WireType::Fixed64 => UnknownValue::Fixed64(src.read_fixed64()?),
        WireType::Fixed32 => UnknownValue::Fixed32(src.read_fixed32()?),
        WireType::LengthDelimited => UnknownValue::LengthDelimited(src.read_bytes()?),
        WireType::StartGroup => {
            let number = tag.number();
            src.enter()?;
            let mut group = UnknownFieldSet::new();
            loop {
                let Some(inner) = src.read_tag()? else {
                    return Err(strata_wire::Error::UnterminatedGroup(number).into());
                };
                if inner.wire_type() == WireType::EndGroup {
                    if inner.number() == number {
                        break;
                    }
                    return Err(strata_wire::Error::InvalidEndGroup(inner.number()).into());
                }
                group.push(inner.number(), read_unknown(src, inner)?);
            }
            src.leave();
            UnknownValue::Group(group)
        }
        WireType::EndGroup => {
            return Err(strata_wire::Error::InvalidEndGroup(tag.number()).into());
        }
    })
}
