//! Sub-messages parsed on first access.
//!
//! A [LazyField] keeps the encoded bytes of a sub-message and parses them the first time the
//! value is read. Until [LazyField::set_value] replaces it, the field is serialized from the
//! original bytes, so reading a lazy field never changes the encoding of its parent.
//!
//! Bytes that fail to parse are not reported to the reader: the field reads as the default
//! instance of its type (and a warning is logged).

use crate::{
    config::ParseOptions,
    error::Error,
    merge,
    message::{Message, MessageBuilder},
    schema::Schema,
    value::Value,
};
use bytes::BufMut;
use std::{fmt, sync::OnceLock};
use strata_wire::{writer, Rope};
use tracing::warn;

/// A sub-message stored as bytes until it is read.
#[derive(Clone)]
pub struct LazyField {
    schema: &'static Schema,
    raw: Option<Rope>,
    options: ParseOptions,
    value: OnceLock<Value>,
}

impl LazyField {
    /// Creates a field that parses `raw` as a message of `schema` when first read.
    pub fn from_bytes(schema: &'static Schema, raw: Rope, options: ParseOptions) -> Self {
        Self {
            schema,
            raw: Some(raw),
            options,
            value: OnceLock::new(),
        }
    }

    /// Returns whether the field holds any content. Never parses.
    pub fn has_value(&self) -> bool {
        self.value.get().is_some() || self.raw.as_ref().is_some_and(|raw| !raw.is_empty())
    }

    /// Returns whether the bytes have been parsed.
    pub fn is_parsed(&self) -> bool {
        self.value.get().is_some()
    }

    /// Returns the bytes the field will be serialized from, if it has not been replaced.
    pub fn raw(&self) -> Option<&Rope> {
        self.raw.as_ref()
    }

    /// Returns the parsed message (as a [Value::Message]), parsing it on first use.
    pub fn value(&self) -> &Value {
        self.value.get_or_init(|| Value::Message(self.parse()))
    }

    /// Returns the parsed message, parsing it on first use.
    pub fn message(&self) -> &Message {
        match self.value() {
            Value::Message(message) => message,
            _ => self.schema.default_instance(),
        }
    }

    fn parse(&self) -> Message {
        let Some(raw) = &self.raw else {
            return self.schema.default_instance().clone();
        };
        let mut builder = MessageBuilder::new(self.schema);
        match merge::merge_bytes(builder.data_mut(), &raw.to_bytes(), &self.options) {
            Ok(()) => builder.build(),
            Err(err) => {
                warn!(
                    message = self.schema.name(),
                    len = raw.len(),
                    ?err,
                    "lazy field failed to parse, using default instance"
                );
                self.schema.default_instance().clone()
            }
        }
    }

    /// Replaces the field's bytes and value with `message`.
    pub fn set_value(&mut self, message: Message) {
        self.raw = None;
        self.value = OnceLock::from(Value::Message(message));
    }

    /// Merges another encoding of the same field into this one.
    ///
    /// While the field's original bytes are in use, the new bytes are appended to them (the
    /// concatenation of two encodings is the encoding of their merge) and nothing is parsed.
    pub fn merge_bytes(&mut self, more: &Rope) -> Result<(), Error> {
        if let Some(raw) = &self.raw {
            self.raw = Some(raw.concat(more));
            self.value = OnceLock::new();
            return Ok(());
        }
        let mut builder = self.message().to_builder();
        merge::merge_bytes(builder.data_mut(), &more.to_bytes(), &self.options)?;
        self.value = OnceLock::from(Value::Message(builder.build()));
        Ok(())
    }

    /// Returns the parsed message, consuming the field.
    pub fn into_message(self) -> Message {
        self.message().clone()
    }

    /// Returns the number of bytes of the encoded message (without a length prefix).
    pub fn encoded_len(&self) -> usize {
        match &self.raw {
            Some(raw) => raw.len(),
            None => self.message().encoded_len(),
        }
    }

    /// Writes the encoded message (without a length prefix).
    pub fn write(&self, buf: &mut impl BufMut) {
        match &self.raw {
            Some(raw) => writer::write_rope(buf, raw),
            None => self.message().write_to(buf),
        }
    }
}

impl fmt::Debug for LazyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyField")
            .field("message", &self.schema.name())
            .field("raw", &self.raw.as_ref().map(Rope::len))
            .field("parsed", &self.is_parsed())
            .finish()
    }
}
