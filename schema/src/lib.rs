//! Parse, merge and serialize messages described by field tables.
//!
//! # Overview
//!
//! A message type is a `static` [MessageType] whose [Schema] (a table of [FieldInfo]s) is built on
//! first use. Every message of every type is handled by the same generic routines, driven by that
//! table:
//! - parsing, from a contiguous [bytes::Bytes] or from any [bytes::Buf], with identical results
//! - merging one message into another
//! - computing the serialized size (memoized per message) and serializing, into one buffer or
//!   into bounded chunks
//! - checking that required fields are set
//!
//! Fields a message does not recognize are kept in its [UnknownFieldSet] and written back
//! unchanged. Sub-message fields declared lazy are kept as bytes until first read ([LazyField]).
//! Extension fields are recognized through an [ExtensionLookup] passed in [ParseOptions].
//!
//! # Example
//!
//! ```
//! use strata_schema::{FieldInfo, FieldType, MessageType, SchemaBuilder, Syntax, Value};
//!
//! static POINT: MessageType = MessageType::new("example.Point", || {
//!     SchemaBuilder::new("example.Point", Syntax::Proto3)
//!         .field(FieldInfo::new("x", 1, FieldType::Sint32))
//!         .field(FieldInfo::new("y", 2, FieldType::Sint32))
//!         .field(FieldInfo::new("label", 3, FieldType::String))
//! });
//!
//! let mut builder = POINT.builder().unwrap();
//! builder.set("x", -3).unwrap().set("label", "origin").unwrap();
//! let point = builder.build();
//!
//! let bytes = point.to_bytes();
//! let parsed = POINT.parse(&bytes).unwrap();
//! assert_eq!(parsed, point);
//! assert_eq!(parsed.get("x"), Some(&Value::I32(-3)));
//! assert!(!parsed.has("y"));
//! ```

mod config;
mod encode;
mod error;
mod extension;
mod lazy;
mod merge;
mod message;
mod registry;
mod schema;
mod unknown;
mod value;

pub use config::ParseOptions;
pub use error::{Error, RegistrationError};
pub use extension::{Extension, ExtensionLookup, ExtensionRegistry};
pub use lazy::LazyField;
pub use message::{Message, MessageBuilder};
pub use registry::MessageType;
pub use schema::{
    Cardinality, EnumInfo, FieldInfo, FieldType, MapEntry, Schema, SchemaBuilder, Syntax,
    RUNTIME_VERSION,
};
pub use unknown::{UnknownFieldSet, UnknownValue};
pub use value::{MapKey, Value};
