//! Tokenizer and object parser.
//!
//! - `lexer`: byte-level tokenizer over a pushback reader
//! - `object_parser`: push-down parser producing indirect objects and
//!   trailers

pub mod lexer;
pub mod object_parser;

pub use lexer::{Keyword, Lexer, Token};
pub use object_parser::{Indirect, ObjectParser, Outcome};
