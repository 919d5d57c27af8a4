//! Messages and message builders.
//!
//! A [MessageBuilder] owns mutable field storage. [MessageBuilder::build] freezes it into a
//! [Message], which is immutable, cheap to clone and safe to share between threads. Built
//! messages share string, bytes and sub-message storage with the builder they came from and with
//! each other.

use crate::{
    config::ParseOptions,
    error::Error,
    extension::Extension,
    lazy::LazyField,
    merge,
    schema::{FieldInfo, FieldType, Schema},
    unknown::UnknownFieldSet,
    value::{FieldValue, MapKey, Value},
};
use bytes::{Buf, Bytes};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Marks a cached size as unknown.
const DIRTY: usize = usize::MAX;

/// An extension field stored in a message.
#[derive(Clone, Debug)]
pub(crate) struct ExtensionField {
    pub(crate) extension: Arc<Extension>,
    pub(crate) value: FieldValue,
}

/// The storage of a message.
pub(crate) struct MessageData {
    pub(crate) schema: &'static Schema,
    pub(crate) fields: Vec<Option<FieldValue>>,
    pub(crate) extensions: BTreeMap<u32, ExtensionField>,
    pub(crate) unknown: UnknownFieldSet,

    /// The serialized size, or [DIRTY].
    cached_size: AtomicUsize,
}

impl Clone for MessageData {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema,
            fields: self.fields.clone(),
            extensions: self.extensions.clone(),
            unknown: self.unknown.clone(),
            cached_size: AtomicUsize::new(self.cached_size.load(Ordering::Relaxed)),
        }
    }
}

impl MessageData {
    pub(crate) fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            fields: vec![None; schema.fields().len()],
            extensions: BTreeMap::new(),
            unknown: UnknownFieldSet::new(),
            cached_size: AtomicUsize::new(DIRTY),
        }
    }

    /// Returns the memoized serialized size.
    pub(crate) fn cached_size(&self) -> Option<usize> {
        match self.cached_size.load(Ordering::Relaxed) {
            DIRTY => None,
            size => Some(size),
        }
    }

    /// Memoizes the serialized size. Racing writers store the same value.
    pub(crate) fn cache_size(&self, size: usize) {
        if size != DIRTY {
            self.cached_size.store(size, Ordering::Relaxed);
        }
    }

    pub(crate) fn invalidate(&self) {
        self.cached_size.store(DIRTY, Ordering::Relaxed);
    }

    /// Stores `value` in field `index`, clearing the other members of its oneof.
    pub(crate) fn set_field(&mut self, index: usize, value: FieldValue) {
        self.clear_oneof_siblings(index);
        self.fields[index] = Some(value);
    }

    /// Clears every member of field `index`'s oneof other than `index` itself.
    pub(crate) fn clear_oneof_siblings(&mut self, index: usize) {
        let Some(oneof) = self.schema.field(index).oneof_index() else {
            return;
        };
        for (i, field) in self.schema.fields().iter().enumerate() {
            if i != index && field.oneof_index() == Some(oneof) {
                self.fields[i] = None;
            }
        }
    }

    /// Collects the paths of unset required fields, recursively.
    fn collect_missing(&self, prefix: &str, out: &mut Vec<String>) {
        for (field, slot) in self.schema.fields().iter().zip(&self.fields) {
            let path = format!("{prefix}{}", field.name());
            match slot {
                None if field.is_required() => out.push(path),
                None => {}
                Some(value) => collect_missing_in(value, &path, out),
            }
        }
        for extension in self.extensions.values() {
            let path = format!("{prefix}({})", extension.extension.full_name());
            collect_missing_in(&extension.value, &path, out);
        }
    }

    /// Clears unknown fields here and in every nested message.
    pub(crate) fn discard_unknown_fields(&mut self) {
        self.invalidate();
        self.unknown.clear();
        let slots = self
            .fields
            .iter_mut()
            .flatten()
            .chain(self.extensions.values_mut().map(|extension| &mut extension.value));
        for slot in slots {
            if let FieldValue::Lazy(lazy) = slot {
                *slot = FieldValue::Singular(Value::Message(lazy.message().clone()));
            }
            match slot {
                FieldValue::Singular(Value::Message(message)) => {
                    message.data_mut().discard_unknown_fields()
                }
                FieldValue::Repeated(values) => {
                    for value in values {
                        if let Value::Message(message) = value {
                            message.data_mut().discard_unknown_fields();
                        }
                    }
                }
                FieldValue::Map(entries) => {
                    for value in entries.values_mut() {
                        if let Value::Message(message) = value {
                            message.data_mut().discard_unknown_fields();
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Merges the fields of `other` into this message.
    ///
    /// Set singular fields of `other` replace those here, except sub-messages, which merge.
    /// Repeated fields append, map entries replace entries with the same key and unknown fields
    /// append.
    pub(crate) fn merge_from(&mut self, other: &MessageData) -> Result<(), Error> {
        self.invalidate();
        for (index, slot) in other.fields.iter().enumerate() {
            let Some(value) = slot else {
                continue;
            };
            self.clear_oneof_siblings(index);
            merge_field_value(&mut self.fields[index], value)?;
        }
        for (number, extension) in &other.extensions {
            match self.extensions.get_mut(number) {
                Some(existing) => {
                    let mut slot = Some(existing.value.clone());
                    merge_field_value(&mut slot, &extension.value)?;
                    if let Some(value) = slot {
                        existing.value = value;
                    }
                }
                None => {
                    self.extensions.insert(*number, extension.clone());
                }
            }
        }
        self.unknown.merge_from(&other.unknown);
        Ok(())
    }
}

fn collect_missing_in(value: &FieldValue, path: &str, out: &mut Vec<String>) {
    match value {
        FieldValue::Singular(Value::Message(message)) => {
            message.data.collect_missing(&format!("{path}."), out)
        }
        FieldValue::Lazy(lazy) => lazy.message().data.collect_missing(&format!("{path}."), out),
        FieldValue::Repeated(values) => {
            for (i, value) in values.iter().enumerate() {
                if let Value::Message(message) = value {
                    message.data.collect_missing(&format!("{path}[{i}]."), out);
                }
            }
        }
        FieldValue::Map(entries) => {
            for (key, value) in entries {
                if let Value::Message(message) = value {
                    message
                        .data
                        .collect_missing(&format!("{path}[{key}]."), out);
                }
            }
        }
        FieldValue::Singular(_) => {}
    }
}

/// Merges one field's contents into another's.
fn merge_field_value(dst: &mut Option<FieldValue>, src: &FieldValue) -> Result<(), Error> {
    let Some(existing) = dst else {
        *dst = Some(src.clone());
        return Ok(());
    };
    match (existing, src) {
        (FieldValue::Repeated(values), FieldValue::Repeated(more)) => {
            values.extend(more.iter().cloned());
        }
        (FieldValue::Map(entries), FieldValue::Map(more)) => {
            for (key, value) in more {
                entries.insert(key.clone(), value.clone());
            }
        }
        // Unparsed encodings merge by concatenation.
        (FieldValue::Lazy(lazy), FieldValue::Lazy(other)) if other.raw().is_some() => {
            if let Some(raw) = other.raw() {
                lazy.merge_bytes(raw)?;
            }
        }
        (existing, src) => match (existing.singular(), src.singular()) {
            (Some(Value::Message(a)), Some(Value::Message(b))) => {
                let mut merged = a.clone();
                merged.data_mut().merge_from(&b.data)?;
                *existing = FieldValue::Singular(Value::Message(merged));
            }
            _ => *existing = src.clone(),
        },
    }
    Ok(())
}

/// An immutable message.
#[derive(Clone)]
pub struct Message {
    pub(crate) data: Arc<MessageData>,
}

impl Message {
    pub(crate) fn empty(schema: &'static Schema) -> Self {
        Self {
            data: Arc::new(MessageData::new(schema)),
        }
    }

    /// Returns this message's storage for modification, copying it if it is shared.
    pub(crate) fn data_mut(&mut self) -> &mut MessageData {
        let data = Arc::make_mut(&mut self.data);
        data.invalidate();
        data
    }

    pub fn schema(&self) -> &'static Schema {
        self.data.schema
    }

    /// Returns a builder holding a copy of this message.
    pub fn to_builder(&self) -> MessageBuilder {
        MessageBuilder {
            data: (*self.data).clone(),
        }
    }

    fn slot(&self, name: &str) -> Option<&FieldValue> {
        let index = self.data.schema.index_by_name(name)?;
        self.data.fields[index].as_ref()
    }

    /// Returns whether the field called `name` is set (or, if repeated, non-empty).
    pub fn has(&self, name: &str) -> bool {
        match self.slot(name) {
            Some(FieldValue::Repeated(values)) => !values.is_empty(),
            Some(FieldValue::Map(entries)) => !entries.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// Returns the value of the singular field called `name`, if set.
    ///
    /// Reading a lazy field parses it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let slot = self.slot(name)?;
        if let FieldValue::Lazy(lazy) = slot {
            if !lazy.is_parsed() {
                // Forcing a lazy field dirties the memoized size.
                self.data.invalidate();
            }
        }
        slot.singular()
    }

    /// Returns the value of the singular field called `name`, or its default if unset.
    pub fn get_or_default(&self, name: &str) -> Result<Value, Error> {
        let index = self
            .data
            .schema
            .index_by_name(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        field_or_default(self.data.schema.field(index), self.data.fields[index].as_ref())
    }

    /// Returns the elements of the repeated field called `name`.
    pub fn get_repeated(&self, name: &str) -> &[Value] {
        self.slot(name).map_or(&[], FieldValue::repeated)
    }

    /// Returns the entries of the map field called `name`.
    pub fn get_map(&self, name: &str) -> Option<&BTreeMap<MapKey, Value>> {
        match self.slot(name)? {
            FieldValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the lazy storage of the field called `name`, if it has not been parsed eagerly.
    pub fn lazy_field(&self, name: &str) -> Option<&LazyField> {
        match self.slot(name)? {
            FieldValue::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    /// Returns the name of the set member of the oneof called `oneof`.
    pub fn which_oneof(&self, oneof: &str) -> Option<&'static str> {
        which_oneof(&self.data, oneof)
    }

    pub fn has_extension(&self, number: u32) -> bool {
        self.data.extensions.contains_key(&number)
    }

    /// Returns the value of the singular extension numbered `number`, if set.
    pub fn get_extension(&self, number: u32) -> Option<&Value> {
        self.data.extensions.get(&number)?.value.singular()
    }

    /// Returns the elements of the repeated extension numbered `number`.
    pub fn get_repeated_extension(&self, number: u32) -> &[Value] {
        self.data
            .extensions
            .get(&number)
            .map_or(&[], |extension| extension.value.repeated())
    }

    /// Returns the fields that were not recognized while parsing.
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.data.unknown
    }

    /// Returns whether every required field is set, recursively.
    pub fn is_initialized(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Returns the paths of unset required fields, such as `a.b[2].c`.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.data.collect_missing("", &mut out);
        out
    }

    /// Parses `bytes` and merges the result into a copy of this message.
    pub fn merge_from_bytes(&self, bytes: &Bytes, options: &ParseOptions) -> Result<Message, Error> {
        let mut builder = self.to_builder();
        builder.merge_from_bytes(bytes, options)?;
        Ok(builder.build())
    }
}

fn which_oneof(data: &MessageData, oneof: &str) -> Option<&'static str> {
    let index = data.schema.oneof_by_name(oneof)?;
    data.schema
        .fields()
        .iter()
        .zip(&data.fields)
        .find(|(field, slot)| field.oneof_index() == Some(index) && slot.is_some())
        .map(|(field, _)| field.name())
}

fn field_or_default(field: &FieldInfo, slot: Option<&FieldValue>) -> Result<Value, Error> {
    if field.is_repeated() || field.is_map() {
        return Err(Error::TypeMismatch {
            field: field.name().to_string(),
            expected: "singular field",
        });
    }
    if let Some(value) = slot.and_then(FieldValue::singular) {
        return Ok(value.clone());
    }
    if let Some(default) = field.default() {
        return Ok(default);
    }
    match field.message_type() {
        Some(ty) => Ok(Value::Message(ty.default_instance()?.clone())),
        None => Err(Error::UnknownField(field.name().to_string())),
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        let (a, b) = (&*self.data, &*other.data);
        std::ptr::eq(a.schema, b.schema)
            && a.fields == b.fields
            && a.extensions.len() == b.extensions.len()
            && a
                .extensions
                .iter()
                .zip(&b.extensions)
                .all(|((n, x), (m, y))| n == m && x.value == y.value)
            && a.unknown == b.unknown
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = &self.data;
        let mut out = f.debug_struct(data.schema.name());
        for (field, slot) in data.schema.fields().iter().zip(&data.fields) {
            if let Some(value) = slot {
                out.field(field.name(), value);
            }
        }
        for extension in data.extensions.values() {
            out.field(extension.extension.full_name(), &extension.value);
        }
        if !data.unknown.is_empty() {
            out.field("unknown", &data.unknown);
        }
        out.finish()
    }
}

/// Builds a [Message].
#[derive(Clone)]
pub struct MessageBuilder {
    data: MessageData,
}

impl MessageBuilder {
    /// Creates a builder for a message of `schema` with no fields set.
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            data: MessageData::new(schema),
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut MessageData {
        self.data.invalidate();
        &mut self.data
    }

    pub fn schema(&self) -> &'static Schema {
        self.data.schema
    }

    fn index(&self, name: &str) -> Result<usize, Error> {
        self.data
            .schema
            .index_by_name(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Sets the singular field called `name`.
    ///
    /// Setting a oneof member clears the other members. Setting a field without presence to its
    /// zero value clears it. Setting a lazy field drops the bytes it was parsed from.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, Error> {
        let index = self.index(name)?;
        let field = self.data.schema.field(index);
        if field.is_repeated() || field.is_map() {
            return Err(mismatch(field, "singular field"));
        }
        let value = value.into();
        check_value(field, field.field_type(), &value)?;
        let data = self.data_mut();
        if !field.has_presence() && value.is_zero() {
            data.fields[index] = None;
            return Ok(self);
        }
        let value = match (&mut data.fields[index], value) {
            (Some(FieldValue::Lazy(lazy)), Value::Message(message)) => {
                lazy.set_value(message);
                return Ok(self);
            }
            (_, value) => value,
        };
        data.set_field(index, FieldValue::Singular(value));
        Ok(self)
    }

    /// Appends to the repeated field called `name`.
    pub fn push(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, Error> {
        let index = self.index(name)?;
        let field = self.data.schema.field(index);
        if !field.is_repeated() {
            return Err(mismatch(field, "repeated field"));
        }
        let value = value.into();
        check_value(field, field.field_type(), &value)?;
        match &mut self.data_mut().fields[index] {
            Some(FieldValue::Repeated(values)) => values.push(value),
            slot => *slot = Some(FieldValue::Repeated(vec![value])),
        }
        Ok(self)
    }

    /// Inserts an entry into the map field called `name`, replacing any entry with the same key.
    pub fn insert(
        &mut self,
        name: &str,
        key: impl Into<MapKey>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let index = self.index(name)?;
        let field = self.data.schema.field(index);
        let Some(entry) = field.map_entry() else {
            return Err(mismatch(field, "map field"));
        };
        let key = key.into();
        if !key.to_value().fits(entry.key) {
            return Err(mismatch(field, "map key"));
        }
        let value = value.into();
        check_value(field, entry.value, &value)?;
        match &mut self.data_mut().fields[index] {
            Some(FieldValue::Map(entries)) => {
                entries.insert(key, value);
            }
            slot => *slot = Some(FieldValue::Map(BTreeMap::from([(key, value)]))),
        }
        Ok(self)
    }

    /// Clears the field called `name`.
    pub fn clear(&mut self, name: &str) -> Result<&mut Self, Error> {
        let index = self.index(name)?;
        self.data_mut().fields[index] = None;
        Ok(self)
    }

    /// Returns the value of the singular field called `name`, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.data.schema.index_by_name(name)?;
        self.data.fields[index].as_ref()?.singular()
    }

    /// Returns the name of the set member of the oneof called `oneof`.
    pub fn which_oneof(&self, oneof: &str) -> Option<&'static str> {
        which_oneof(&self.data, oneof)
    }

    fn check_extension(&self, extension: &Extension) -> Result<(), Error> {
        let schema = self.data.schema;
        if extension.extendee() != schema.name() || !schema.is_extension(extension.number()) {
            return Err(Error::UnknownField(extension.full_name().to_string()));
        }
        Ok(())
    }

    /// Sets a singular extension.
    pub fn set_extension(
        &mut self,
        extension: &Arc<Extension>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        self.check_extension(extension)?;
        let field = extension.field();
        if field.is_repeated() || field.is_map() {
            return Err(mismatch(field, "singular field"));
        }
        let value = value.into();
        check_value(field, field.field_type(), &value)?;
        self.data_mut().extensions.insert(
            extension.number(),
            ExtensionField {
                extension: extension.clone(),
                value: FieldValue::Singular(value),
            },
        );
        Ok(self)
    }

    /// Appends to a repeated extension.
    pub fn push_extension(
        &mut self,
        extension: &Arc<Extension>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        self.check_extension(extension)?;
        let field = extension.field();
        if !field.is_repeated() {
            return Err(mismatch(field, "repeated field"));
        }
        let value = value.into();
        check_value(field, field.field_type(), &value)?;
        let stored = self
            .data_mut()
            .extensions
            .entry(extension.number())
            .or_insert_with(|| ExtensionField {
                extension: extension.clone(),
                value: FieldValue::Repeated(Vec::new()),
            });
        if let FieldValue::Repeated(values) = &mut stored.value {
            values.push(value);
        }
        Ok(self)
    }

    /// Clears the extension numbered `number`.
    pub fn clear_extension(&mut self, number: u32) -> &mut Self {
        self.data_mut().extensions.remove(&number);
        self
    }

    /// Returns the unknown fields for modification.
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.data_mut().unknown
    }

    /// Drops unknown fields from this message and every nested message.
    pub fn discard_unknown_fields(&mut self) -> &mut Self {
        self.data.discard_unknown_fields();
        self
    }

    /// Merges `other` into this message.
    pub fn merge(&mut self, other: &Message) -> Result<&mut Self, Error> {
        if !std::ptr::eq(self.data.schema, other.data.schema) {
            return Err(Error::TypeMismatch {
                field: other.data.schema.name().to_string(),
                expected: self.data.schema.name(),
            });
        }
        self.data.merge_from(&other.data)?;
        Ok(self)
    }

    /// Parses `bytes` (a contiguous buffer) into this message.
    pub fn merge_from_bytes(
        &mut self,
        bytes: &Bytes,
        options: &ParseOptions,
    ) -> Result<&mut Self, Error> {
        merge::merge_bytes(self.data_mut(), bytes, options)?;
        Ok(self)
    }

    /// Parses `buf` (any buffer) into this message.
    pub fn merge_from_buf(
        &mut self,
        buf: impl Buf,
        options: &ParseOptions,
    ) -> Result<&mut Self, Error> {
        merge::merge_buf(self.data_mut(), buf, options)?;
        Ok(self)
    }

    pub fn is_initialized(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.data.collect_missing("", &mut out);
        out
    }

    /// Returns the serialized size of the message as currently built.
    pub fn encoded_len(&self) -> usize {
        self.data.encoded_len()
    }

    /// Freezes the builder into a message.
    pub fn build(self) -> Message {
        Message {
            data: Arc::new(self.data),
        }
    }
}

fn mismatch(field: &FieldInfo, expected: &'static str) -> Error {
    Error::TypeMismatch {
        field: field.name().to_string(),
        expected,
    }
}

/// Checks that `value` may be stored in `field` as a value of type `ty`.
fn check_value(field: &FieldInfo, ty: FieldType, value: &Value) -> Result<(), Error> {
    if !value.fits(ty) {
        return Err(mismatch(field, "value of the declared type"));
    }
    match value {
        Value::Message(message) => {
            let expected = field
                .message_type()
                .ok_or_else(|| mismatch(field, "message type"))?
                .schema()?;
            if !std::ptr::eq(message.schema(), expected) {
                return Err(mismatch(field, expected.name()));
            }
        }
        Value::Enum(number) => {
            if let Some(info) = field.enum_info() {
                if !info.accepts(*number) {
                    return Err(mismatch(field, info.name()));
                }
            }
        }
        Value::String(text) if field.is_strict_utf8() && !text.is_valid_utf8() => {
            return Err(Error::Wire(strata_wire::Error::InvalidUtf8));
        }
        _ => {}
    }
    Ok(())
}

impl fmt::Debug for MessageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("message", &self.data.schema.name())
            .finish()
    }
}
