//! Errors returned by schema registration, parsing and field access.

use thiserror::Error;

/// A schema failed to register.
///
/// Registration errors are cached: once a message type fails to register, every later use of it
/// returns the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{name}: built for runtime {built:?}, running {runtime:?}")]
    SchemaVersionMismatch {
        name: &'static str,
        built: (u32, u32),
        runtime: (u32, u32),
    },
    #[error("{0}: invalid field number {1}")]
    InvalidFieldNumber(&'static str, u32),
    #[error("{0}: duplicate field number {1}")]
    DuplicateFieldNumber(&'static str, u32),
    #[error("{0}: duplicate field name {1}")]
    DuplicateFieldName(&'static str, &'static str),
    #[error("{0}.{1}: type cannot be packed")]
    NotPackable(&'static str, &'static str),
    #[error("{0}.{1}: missing message type")]
    MissingMessageType(&'static str, &'static str),
    #[error("{0}.{1}: message type set on a scalar field")]
    UnexpectedMessageType(&'static str, &'static str),
    #[error("{0}.{1}: missing enum type")]
    MissingEnumType(&'static str, &'static str),
    #[error("{0}.{1}: invalid map key or value type")]
    InvalidMapEntry(&'static str, &'static str),
    #[error("{0}.{1}: invalid oneof member")]
    InvalidOneof(&'static str, &'static str),
    #[error("{0}.{1}: default does not match field type")]
    InvalidDefault(&'static str, &'static str),
    #[error("{0}.{1}: only singular message fields may be lazy")]
    InvalidLazy(&'static str, &'static str),
    #[error("{0}: field {1} overlaps an extension range")]
    ExtensionOverlap(&'static str, u32),
}

/// Errors that can occur when parsing or manipulating messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("wire error: {0}")]
    Wire(#[from] strata_wire::Error),
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),
    #[error("missing required fields: {0:?}")]
    Uninitialized(Vec<String>),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("type mismatch for {field}: expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}
