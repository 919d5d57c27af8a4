//! Error types for wire operations

use thiserror::Error;

/// Error type for wire operations.
///
/// Every failure carries the kind of malformation rather than the position at which it was
/// detected, so the stream and array decoders report identical errors for identical input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed varint")]
    MalformedVarint,
    #[error("malformed length: {0}")]
    MalformedLength(u64),
    #[error("truncated message")]
    TruncatedMessage,
    #[error("unterminated group: {0}")]
    UnterminatedGroup(u32),
    #[error("unexpected end group: {0}")]
    InvalidEndGroup(u32),
    #[error("invalid tag: {0}")]
    InvalidTag(u64),
    #[error("invalid wire type: {0}")]
    InvalidWireType(u8),
    #[error("recursion limit exceeded: {0}")]
    RecursionLimitExceeded(usize),
    #[error("invalid utf-8")]
    InvalidUtf8,
    #[error("size limit exceeded: {0} > {1}")]
    SizeLimitExceeded(usize, usize), // found, max
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
}
