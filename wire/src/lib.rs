//! Encode and decode the protocol buffers wire format.
//!
//! # Overview
//!
//! This crate holds the primitives a schema-driven message engine is built from:
//! - [varint]: variable-length integers and zig-zag transforms
//! - [tag]: field numbers paired with wire types
//! - [utf8]: validation of string payloads
//! - [rope]: an immutable, structurally-shared byte sequence used for every length-delimited
//!   payload
//! - [reader]: a tag-level cursor over any [bytes::Buf], with a stack of nested limits
//! - [decode]: the same cursor operations over a contiguous buffer, storing results in
//!   [decode::Registers]
//! - [writer]: tag-level writers over any [bytes::BufMut] and a sink that emits bounded chunks
//!
//! [reader] and [decode] are interchangeable: for identical input they produce identical values
//! and fail with identical [Error]s.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use strata_wire::{reader::Reader, writer, Rope, WireType};
//!
//! let mut buf = Vec::new();
//! writer::write_tag(&mut buf, 1, WireType::Varint);
//! strata_wire::varint::write(150u64, &mut buf);
//! writer::write_bytes_field(&mut buf, 2, &Rope::from("hello"));
//!
//! let mut reader = Reader::new(Bytes::from(buf));
//! let tag = reader.read_tag().unwrap().unwrap();
//! assert_eq!((tag.number(), tag.wire_type()), (1, WireType::Varint));
//! assert_eq!(reader.read_varint().unwrap(), 150);
//! let tag = reader.read_tag().unwrap().unwrap();
//! assert_eq!(tag.number(), 2);
//! assert_eq!(reader.read_bytes().unwrap(), Rope::from("hello"));
//! assert!(reader.read_tag().unwrap().is_none());
//! ```

pub mod codec;
pub mod decode;
pub mod error;
pub mod reader;
pub mod rope;
pub mod tag;
pub mod utf8;
pub mod varint;
pub mod writer;

// Re-export main types and traits
pub use codec::{Decode, Encode, EncodeSize, Read, Write};
pub use error::Error;
pub use rope::{Rope, RopeReader};
pub use tag::{Tag, WireType, MAX_FIELD_NUMBER};

/// The default maximum nesting depth of groups and sub-messages.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// The largest length a length-delimited payload may declare.
pub const MAX_LENGTH: u64 = i32::MAX as u64;
