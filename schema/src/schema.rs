//! Field tables.
//!
//! A [Schema] describes one message type: its fields (sorted by number), its oneof groups and
//! the field numbers reserved for extensions. Schemas are declared with a [SchemaBuilder], checked
//! once when first used (see [crate::MessageType]) and never mutated afterwards.

use crate::{error::RegistrationError, message::Message, registry::MessageType, value::Value};
use std::{ops::RangeInclusive, sync::OnceLock};
use strata_wire::{WireType, MAX_FIELD_NUMBER};
use tracing::{debug, warn};

/// The version of the field-table format this runtime understands, as `(major, minor)`.
///
/// A schema built for a different major version, or for a newer minor version, is rejected.
pub const RUNTIME_VERSION: (u32, u32) = (0, 1);

/// The declared type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldType {
    /// Returns the wire type of a single (unpacked) value of this type.
    pub const fn wire_type(self) -> WireType {
        use FieldType as T;
        match self {
            T::Double | T::Fixed64 | T::Sfixed64 => WireType::Fixed64,
            T::Float | T::Fixed32 | T::Sfixed32 => WireType::Fixed32,
            T::Int64 | T::Uint64 | T::Int32 | T::Bool | T::Uint32 | T::Enum | T::Sint32 | T::Sint64 => {
                WireType::Varint
            }
            T::String | T::Message | T::Bytes => WireType::LengthDelimited,
            T::Group => WireType::StartGroup,
        }
    }

    /// Returns whether repeated values of this type may be packed.
    pub const fn is_packable(self) -> bool {
        self.wire_type().is_packable()
    }

    /// Returns whether values of this type are messages.
    pub const fn is_message(self) -> bool {
        matches!(self, FieldType::Message | FieldType::Group)
    }

    /// Returns whether this type may key a map.
    pub const fn is_map_key(self) -> bool {
        !matches!(
            self,
            FieldType::Double
                | FieldType::Float
                | FieldType::Bytes
                | FieldType::Enum
                | FieldType::Message
                | FieldType::Group
        )
    }
}

/// How many values a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
    Map,
}

/// The language revision a schema was declared in.
///
/// Proto3 schemas default to implicit presence for scalars, packed repeated scalars and strict
/// UTF-8 checking of strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

/// The values of an enum type.
#[derive(Debug)]
pub struct EnumInfo {
    name: &'static str,
    values: &'static [i32],
    closed: bool,
}

impl EnumInfo {
    /// Declares a closed enum: unrecognized values are kept as unknown fields.
    pub const fn closed(name: &'static str, values: &'static [i32]) -> Self {
        Self {
            name,
            values,
            closed: true,
        }
    }

    /// Declares an open enum: unrecognized values are kept in the field.
    pub const fn open(name: &'static str, values: &'static [i32]) -> Self {
        Self {
            name,
            values,
            closed: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns whether `value` is a declared value.
    pub fn contains(&self, value: i32) -> bool {
        self.values.contains(&value)
    }

    /// Returns whether a field of this type may hold `value`.
    pub fn accepts(&self, value: i32) -> bool {
        !self.closed || self.contains(value)
    }

    /// The value of an unset field: the first declared value.
    pub fn default_value(&self) -> i32 {
        self.values.first().copied().unwrap_or(0)
    }
}

/// The key and value of a map field's entries.
#[derive(Clone, Copy, Debug)]
pub struct MapEntry {
    pub key: FieldType,
    pub value: FieldType,
}

/// The description of one field.
#[derive(Clone, Debug)]
pub struct FieldInfo {
    name: &'static str,
    number: u32,
    ty: FieldType,
    cardinality: Cardinality,
    map: Option<MapEntry>,
    packed: Option<bool>,
    explicit_presence: Option<bool>,
    strict_utf8: Option<bool>,
    oneof_name: Option<&'static str>,
    oneof: Option<usize>,
    message: Option<&'static MessageType>,
    enumeration: Option<&'static EnumInfo>,
    lazy: bool,
    default: Option<Value>,
}

impl FieldInfo {
    /// Declares an optional singular field.
    pub fn new(name: &'static str, number: u32, ty: FieldType) -> Self {
        Self {
            name,
            number,
            ty,
            cardinality: Cardinality::Optional,
            map: None,
            packed: None,
            explicit_presence: None,
            strict_utf8: None,
            oneof_name: None,
            oneof: None,
            message: None,
            enumeration: None,
            lazy: false,
            default: None,
        }
    }

    /// Declares a map field. A message or enum value type is set with [FieldInfo::message] or
    /// [FieldInfo::enumeration].
    pub fn map(name: &'static str, number: u32, key: FieldType, value: FieldType) -> Self {
        let mut field = Self::new(name, number, FieldType::Message);
        field.cardinality = Cardinality::Map;
        field.map = Some(MapEntry { key, value });
        field
    }

    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Overrides whether a repeated scalar field is written packed.
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    /// Gives a proto3 scalar field explicit presence.
    pub fn optional(mut self) -> Self {
        self.explicit_presence = Some(true);
        self
    }

    /// Overrides whether string values must be valid UTF-8.
    pub fn utf8_validation(mut self, strict: bool) -> Self {
        self.strict_utf8 = Some(strict);
        self
    }

    /// Sets the message type of a message, group or map-value field.
    pub fn message(mut self, ty: &'static MessageType) -> Self {
        self.message = Some(ty);
        self
    }

    /// Sets the enum type of an enum or map-value field.
    pub fn enumeration(mut self, info: &'static EnumInfo) -> Self {
        self.enumeration = Some(info);
        self
    }

    /// Makes the field a member of the named oneof.
    pub fn oneof(mut self, name: &'static str) -> Self {
        self.oneof_name = Some(name);
        self
    }

    /// Defers parsing of this (singular message) field until it is read.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Sets the value reported for the field while it is unset.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    pub fn map_entry(&self) -> Option<MapEntry> {
        self.map
    }

    /// Returns whether repeated values are written packed.
    pub fn is_packed(&self) -> bool {
        self.packed.unwrap_or(false)
    }

    /// Returns whether a zero value is distinguishable from an unset field.
    pub fn has_presence(&self) -> bool {
        self.explicit_presence.unwrap_or(true)
    }

    pub fn is_strict_utf8(&self) -> bool {
        self.strict_utf8.unwrap_or(false)
    }

    /// Returns the index of the field's oneof within its schema.
    pub fn oneof_index(&self) -> Option<usize> {
        self.oneof
    }

    pub fn message_type(&self) -> Option<&'static MessageType> {
        self.message
    }

    pub fn enum_info(&self) -> Option<&'static EnumInfo> {
        self.enumeration
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Returns the declared default, or the zero value of the field's type.
    pub fn default(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        if self.ty == FieldType::Enum {
            return Some(Value::Enum(
                self.enumeration.map_or(0, |info| info.default_value()),
            ));
        }
        Value::zero(self.ty)
    }

    /// Resolves syntax-dependent defaults and checks the declaration.
    pub(crate) fn resolve(&mut self, owner: &'static str, syntax: Syntax) -> Result<(), RegistrationError> {
        let name = self.name;
        if self.number == 0 || self.number > MAX_FIELD_NUMBER {
            return Err(RegistrationError::InvalidFieldNumber(owner, self.number));
        }

        // Type references.
        let value_type = self.map.map_or(self.ty, |entry| entry.value);
        if value_type.is_message() && self.message.is_none() {
            return Err(RegistrationError::MissingMessageType(owner, name));
        }
        if value_type == FieldType::Enum && self.enumeration.is_none() {
            return Err(RegistrationError::MissingEnumType(owner, name));
        }
        if let Some(entry) = self.map {
            if !entry.key.is_map_key() || entry.value == FieldType::Group {
                return Err(RegistrationError::InvalidMapEntry(owner, name));
            }
        } else if self.message.is_some() && !self.ty.is_message() {
            return Err(RegistrationError::UnexpectedMessageType(owner, name));
        }

        // Packing.
        let packable = self.is_repeated() && self.ty.is_packable();
        match self.packed {
            Some(true) if !packable => return Err(RegistrationError::NotPackable(owner, name)),
            Some(_) => {}
            None => self.packed = Some(packable && syntax == Syntax::Proto3),
        }

        // Oneofs and laziness only apply to singular fields.
        let singular = matches!(self.cardinality, Cardinality::Optional);
        if self.oneof_name.is_some() && !singular {
            return Err(RegistrationError::InvalidOneof(owner, name));
        }
        if self.lazy && !(singular && self.ty == FieldType::Message) {
            return Err(RegistrationError::InvalidLazy(owner, name));
        }

        // Presence.
        let explicit = match syntax {
            Syntax::Proto2 => true,
            Syntax::Proto3 => {
                self.ty.is_message()
                    || self.oneof_name.is_some()
                    || self.explicit_presence.unwrap_or(false)
            }
        };
        self.explicit_presence = Some(explicit);

        // Strings.
        if self.strict_utf8.is_none() {
            self.strict_utf8 = Some(syntax == Syntax::Proto3);
        }

        // Defaults.
        if let Some(default) = &self.default {
            if !singular || !default.fits(self.ty) || self.ty.is_message() {
                return Err(RegistrationError::InvalidDefault(owner, name));
            }
        }
        Ok(())
    }
}

/// Declares a [Schema].
pub struct SchemaBuilder {
    name: &'static str,
    syntax: Syntax,
    version: (u32, u32),
    fields: Vec<FieldInfo>,
    extension_ranges: Vec<RangeInclusive<u32>>,
}

impl SchemaBuilder {
    /// Starts declaring the message type `name` (its fully qualified name).
    pub fn new(name: &'static str, syntax: Syntax) -> Self {
        Self {
            name,
            syntax,
            version: RUNTIME_VERSION,
            fields: Vec::new(),
            extension_ranges: Vec::new(),
        }
    }

    /// Records the runtime version the declaration was produced for.
    pub fn version(mut self, major: u32, minor: u32) -> Self {
        self.version = (major, minor);
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Reserves field numbers for extensions.
    pub fn extensions(mut self, range: RangeInclusive<u32>) -> Self {
        self.extension_ranges.push(range);
        self
    }

    /// Checks the declaration and builds the schema.
    pub fn build(self) -> Result<Schema, RegistrationError> {
        let Self {
            name,
            syntax,
            version,
            mut fields,
            extension_ranges,
        } = self;

        let (major, minor) = RUNTIME_VERSION;
        if version.0 != major || version.1 > minor {
            warn!(name, ?version, runtime = ?RUNTIME_VERSION, "schema version mismatch");
            return Err(RegistrationError::SchemaVersionMismatch {
                name,
                built: version,
                runtime: RUNTIME_VERSION,
            });
        }

        // Oneofs are numbered in order of first appearance.
        let mut oneofs: Vec<&'static str> = Vec::new();
        for field in &mut fields {
            field.resolve(name, syntax)?;
            if let Some(oneof) = field.oneof_name {
                let index = match oneofs.iter().position(|existing| *existing == oneof) {
                    Some(index) => index,
                    None => {
                        oneofs.push(oneof);
                        oneofs.len() - 1
                    }
                };
                field.oneof = Some(index);
            }
        }

        fields.sort_by_key(|field| field.number);
        for pair in fields.windows(2) {
            if pair[0].number == pair[1].number {
                return Err(RegistrationError::DuplicateFieldNumber(name, pair[0].number));
            }
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|other| other.name == field.name) {
                return Err(RegistrationError::DuplicateFieldName(name, field.name));
            }
            if extension_ranges.iter().any(|range| range.contains(&field.number)) {
                return Err(RegistrationError::ExtensionOverlap(name, field.number));
            }
        }

        // Small, dense field numbers are looked up directly.
        let max_number = fields.last().map_or(0, |field| field.number) as usize;
        let dense = (max_number <= 2 * fields.len() + 16).then(|| {
            let mut table = vec![None; max_number + 1];
            for (index, field) in fields.iter().enumerate() {
                table[field.number as usize] = Some(index);
            }
            table
        });

        debug!(name, fields = fields.len(), oneofs = oneofs.len(), "built schema");
        Ok(Schema {
            name,
            syntax,
            fields,
            dense,
            oneofs,
            extension_ranges,
            default: OnceLock::new(),
        })
    }
}

/// The field table of a message type.
pub struct Schema {
    name: &'static str,
    syntax: Syntax,
    fields: Vec<FieldInfo>,
    dense: Option<Vec<Option<usize>>>,
    oneofs: Vec<&'static str>,
    extension_ranges: Vec<RangeInclusive<u32>>,
    default: OnceLock<Message>,
}

impl Schema {
    /// Returns the fully qualified name of the message type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Returns the fields, sorted by number.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &FieldInfo {
        &self.fields[index]
    }

    /// Returns the index of the field numbered `number`.
    #[inline]
    pub fn index_of(&self, number: u32) -> Option<usize> {
        match &self.dense {
            Some(table) => table.get(number as usize).copied().flatten(),
            None => self
                .fields
                .binary_search_by_key(&number, |field| field.number)
                .ok(),
        }
    }

    /// Returns the index of the field called `name`.
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn oneofs(&self) -> &[&'static str] {
        &self.oneofs
    }

    /// Returns the index of the oneof called `name`.
    pub fn oneof_by_name(&self, name: &str) -> Option<usize> {
        self.oneofs.iter().position(|oneof| *oneof == name)
    }

    /// Returns whether `number` is reserved for extensions.
    pub fn is_extension(&self, number: u32) -> bool {
        self.extension_ranges
            .iter()
            .any(|range| range.contains(&number))
    }

    /// Returns the message with no fields set.
    pub fn default_instance(&'static self) -> &'static Message {
        self.default.get_or_init(|| Message::empty(self))
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("syntax", &self.syntax)
            .field("fields", &self.fields.len())
            .finish()
    }
}
