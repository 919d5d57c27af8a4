//! Lazily registered message types.
//!
//! Each message type is a `static` [MessageType] holding a function that declares its schema.
//! The schema is built on first use. Building a schema only records references to the message
//! types of its fields (it never builds them), so types that refer to each other in a cycle
//! initialize independently and concurrent first uses never wait on one another.
//!
//! # Example
//!
//! ```
//! use strata_schema::{FieldInfo, FieldType, MessageType, SchemaBuilder, Syntax};
//!
//! static NODE: MessageType = MessageType::new("example.Node", || {
//!     SchemaBuilder::new("example.Node", Syntax::Proto2)
//!         .field(FieldInfo::new("value", 1, FieldType::Int32))
//!         .field(FieldInfo::new("next", 2, FieldType::Message).message(&NODE))
//! });
//!
//! let schema = NODE.schema().unwrap();
//! assert_eq!(schema.fields().len(), 2);
//! ```

use crate::{
    config::ParseOptions,
    error::{Error, RegistrationError},
    merge,
    message::{Message, MessageBuilder},
    schema::{Schema, SchemaBuilder},
};
use bytes::{Buf, Bytes};
use std::{fmt, sync::OnceLock};
use strata_wire::varint;

/// A message type whose schema is built on first use.
pub struct MessageType {
    name: &'static str,
    declare: fn() -> SchemaBuilder,
    schema: OnceLock<Result<Schema, RegistrationError>>,
}

impl MessageType {
    /// Creates a message type declared by `declare`.
    pub const fn new(name: &'static str, declare: fn() -> SchemaBuilder) -> Self {
        Self {
            name,
            declare,
            schema: OnceLock::new(),
        }
    }

    /// Returns the fully qualified name of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the schema, building it if this is the first use.
    ///
    /// If several threads race to build the schema, each builds its own copy and the first to
    /// finish is kept. A failed build is kept like a successful one.
    pub fn schema(&'static self) -> Result<&'static Schema, RegistrationError> {
        if let Some(result) = self.schema.get() {
            return result.as_ref().map_err(Clone::clone);
        }
        let built = (self.declare)().build();
        self.schema
            .get_or_init(|| built)
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Returns the message with no fields set.
    pub fn default_instance(&'static self) -> Result<&'static Message, RegistrationError> {
        Ok(self.schema()?.default_instance())
    }

    /// Returns a builder with no fields set.
    pub fn builder(&'static self) -> Result<MessageBuilder, RegistrationError> {
        Ok(MessageBuilder::new(self.schema()?))
    }

    /// Parses a message from a contiguous buffer with default options.
    pub fn parse(&'static self, bytes: &Bytes) -> Result<Message, Error> {
        self.parse_with(bytes, &ParseOptions::default())
    }

    /// Parses a message from a contiguous buffer.
    ///
    /// Length-delimited fields of the result share `bytes`' storage.
    pub fn parse_with(&'static self, bytes: &Bytes, options: &ParseOptions) -> Result<Message, Error> {
        let mut builder = self.builder()?;
        merge::merge_bytes(builder.data_mut(), bytes, options)?;
        Ok(builder.build())
    }

    /// Parses a message from any buffer.
    pub fn parse_from(&'static self, buf: impl Buf, options: &ParseOptions) -> Result<Message, Error> {
        let mut builder = self.builder()?;
        merge::merge_buf(builder.data_mut(), buf, options)?;
        Ok(builder.build())
    }

    /// Parses a message and checks that every required field is set.
    pub fn parse_checked(&'static self, bytes: &Bytes, options: &ParseOptions) -> Result<Message, Error> {
        let message = self.parse_with(bytes, options)?;
        let missing = message.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Uninitialized(missing));
        }
        Ok(message)
    }

    /// Parses one length-prefixed message from the front of `buf`.
    ///
    /// Returns `None` if `buf` is empty.
    pub fn parse_delimited(
        &'static self,
        buf: &mut impl Buf,
        options: &ParseOptions,
    ) -> Result<Option<Message>, Error> {
        if !buf.has_remaining() {
            return Ok(None);
        }
        let len = varint::read(buf)?;
        if len > strata_wire::MAX_LENGTH {
            return Err(strata_wire::Error::MalformedLength(len).into());
        }
        let len = len as usize;
        if len > buf.remaining() {
            return Err(strata_wire::Error::TruncatedMessage.into());
        }
        let bytes = buf.copy_to_bytes(len);
        self.parse_with(&bytes, options).map(Some)
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("name", &self.name)
            .field("initialized", &self.schema.get().is_some())
            .finish()
    }
}
