//! Field values.

use crate::{lazy::LazyField, message::Message, schema::FieldType};
use std::{collections::BTreeMap, fmt};
use strata_wire::Rope;

/// The value of a singular field or one element of a repeated field.
///
/// Floating point values compare by bit pattern, so `NaN == NaN` and `0.0 != -0.0`.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(i32),
    String(Rope),
    Bytes(Rope),
    Message(Message),
}

impl Value {
    /// Returns the zero value of a scalar type, or `None` for message types.
    pub fn zero(ty: FieldType) -> Option<Value> {
        use FieldType as T;
        Some(match ty {
            T::Double => Value::F64(0.0),
            T::Float => Value::F32(0.0),
            T::Int64 | T::Sint64 | T::Sfixed64 => Value::I64(0),
            T::Uint64 | T::Fixed64 => Value::U64(0),
            T::Int32 | T::Sint32 | T::Sfixed32 => Value::I32(0),
            T::Uint32 | T::Fixed32 => Value::U32(0),
            T::Bool => Value::Bool(false),
            T::Enum => Value::Enum(0),
            T::String => Value::String(Rope::new()),
            T::Bytes => Value::Bytes(Rope::new()),
            T::Message | T::Group => return None,
        })
    }

    /// Returns the name of this value's variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Enum(_) => "enum",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
        }
    }

    /// Returns whether this value may be stored in a field of type `ty`.
    pub(crate) fn fits(&self, ty: FieldType) -> bool {
        use FieldType as T;
        matches!(
            (self, ty),
            (Value::F64(_), T::Double)
                | (Value::F32(_), T::Float)
                | (Value::I64(_), T::Int64 | T::Sint64 | T::Sfixed64)
                | (Value::U64(_), T::Uint64 | T::Fixed64)
                | (Value::I32(_), T::Int32 | T::Sint32 | T::Sfixed32)
                | (Value::U32(_), T::Uint32 | T::Fixed32)
                | (Value::Bool(_), T::Bool)
                | (Value::Enum(_), T::Enum)
                | (Value::String(_), T::String)
                | (Value::Bytes(_), T::Bytes)
                | (Value::Message(_), T::Message | T::Group)
        )
    }

    /// Returns whether a field without presence holding this value is omitted from the output.
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::I32(v) | Value::Enum(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::String(v) | Value::Bytes(v) => v.is_empty(),
            Value::Message(_) => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) | Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text of a string value, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => v.to_str().ok(),
            _ => None,
        }
    }

    /// Returns the bytes of a string or bytes value.
    pub fn as_rope(&self) -> Option<&Rope> {
        match self {
            Value::String(v) | Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) | (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$type> for Value {
                fn from(value: $type) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}
impl_from!(
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Message => Message,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rope::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rope::from(value))
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(Rope::from(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Rope::from(value))
    }
}

/// The key of a map entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(Rope),
}

impl MapKey {
    /// Converts a decoded key value, returning `None` for types that cannot key a map.
    pub fn from_value(value: Value) -> Option<Self> {
        Some(match value {
            Value::Bool(v) => MapKey::Bool(v),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(v) => MapKey::String(v),
            _ => return None,
        })
    }

    /// Converts the key back into a value.
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(v) => write!(f, "{v}"),
            MapKey::I32(v) => write!(f, "{v}"),
            MapKey::I64(v) => write!(f, "{v}"),
            MapKey::U32(v) => write!(f, "{v}"),
            MapKey::U64(v) => write!(f, "{v}"),
            MapKey::String(v) => write!(f, "{:?}", v.to_string_lossy()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::String(Rope::from(value))
    }
}

impl From<i32> for MapKey {
    fn from(value: i32) -> Self {
        MapKey::I32(value)
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        MapKey::I64(value)
    }
}

impl From<u32> for MapKey {
    fn from(value: u32) -> Self {
        MapKey::U32(value)
    }
}

impl From<u64> for MapKey {
    fn from(value: u64) -> Self {
        MapKey::U64(value)
    }
}

impl From<bool> for MapKey {
    fn from(value: bool) -> Self {
        MapKey::Bool(value)
    }
}

/// The stored contents of a field.
#[derive(Clone, Debug)]
pub(crate) enum FieldValue {
    Singular(Value),
    Lazy(LazyField),
    Repeated(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl FieldValue {
    /// Returns the singular value, parsing a lazy field if needed.
    pub(crate) fn singular(&self) -> Option<&Value> {
        match self {
            FieldValue::Singular(value) => Some(value),
            FieldValue::Lazy(lazy) => Some(lazy.value()),
            _ => None,
        }
    }

    pub(crate) fn repeated(&self) -> &[Value] {
        match self {
            FieldValue::Repeated(values) => values,
            _ => &[],
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Repeated(a), FieldValue::Repeated(b)) => a == b,
            (FieldValue::Map(a), FieldValue::Map(b)) => a == b,
            (a, b) => match (a.singular(), b.singular()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_by_bits() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert!(Value::F32(0.0).is_zero());
        assert!(!Value::F32(-0.0).is_zero());
    }

    #[test]
    fn test_fits() {
        assert!(Value::I32(1).fits(FieldType::Sint32));
        assert!(Value::U64(1).fits(FieldType::Fixed64));
        assert!(!Value::I32(1).fits(FieldType::Int64));
        assert!(!Value::Bytes(Rope::new()).fits(FieldType::String));
        assert!(Value::zero(FieldType::Message).is_none());
    }

    #[test]
    fn test_map_key_order_and_display() {
        let mut keys = vec![MapKey::from("b"), MapKey::from("a"), MapKey::from("ab")];
        keys.sort();
        assert_eq!(
            keys,
            vec![MapKey::from("a"), MapKey::from("ab"), MapKey::from("b")]
        );
        assert_eq!(MapKey::from("x").to_string(), "\"x\"");
        assert_eq!(MapKey::from(-3i64).to_string(), "-3");
        assert_eq!(MapKey::from_value(Value::F32(1.0)), None);
    }
}
