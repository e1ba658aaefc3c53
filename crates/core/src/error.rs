//! Error types for the vellum object model.

use thiserror::Error;

/// Primary error type for parsing and loading operations.
///
/// Most malformed-input conditions never surface as errors: the parse and
/// resolve paths degrade to `Object::Null` or absence and log the event.
/// `Error` is reserved for conditions the caller has to act on, such as a
/// document with no locatable catalog or an I/O failure on the source.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid token at offset {pos}: {msg}")]
    Token { pos: u64, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    Type {
        expected: &'static str,
        got: &'static str,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {0}")]
    ObjectNotFound(u32),

    #[error("no valid cross-reference table found")]
    NoValidXref,

    #[error("no document catalog found")]
    NoCatalog,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("worker pool: {0}")]
    Pool(String),
}

/// Convenience Result type alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
