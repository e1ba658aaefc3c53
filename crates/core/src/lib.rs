//! vellum - a lazy-loading PDF object model.
//!
//! The crate parses PDF syntax into typed objects and resolves
//! indirect references on demand: opening a document reads the header,
//! the trailer chain, and nothing else. Object bytes are parsed when a
//! reference is first chased, stream payloads are windows into the
//! source until someone asks for the decoded bytes, and everything
//! resolved passes through an LRU cache.
//!
//! Entry points: [`Document`] to open a file, [`Library`] to resolve
//! references and read typed dictionary entries, [`parser::ObjectParser`]
//! for driving the parser over raw bytes directly.
//!
//! Malformed input is the expected case, not the exception: parse and
//! resolve paths degrade to `Object::Null` or absence, log what they
//! skipped, and keep going. Hard errors are reserved for I/O failures
//! and documents with no locatable catalog.

pub mod codec;
pub mod document;
pub mod error;
pub mod io;
pub mod model;
pub mod parser;
pub mod pool;
pub mod utils;

pub use document::catalog::{Document, LoadOptions};
pub use document::library::{IccProfile, Library};
pub use document::loader::ObjectLoader;
pub use document::security::SecurityManager;
pub use document::xref::{CrossReference, Trailer, XrefEntry, XrefSection};
pub use error::{Error, Result};
pub use model::typed::{ObjectKind, StreamKind};
pub use model::{
    Dictionary, Name, Object, PdfString, Rect, Reference, Stream, StreamData, StringKind,
};
pub use pool::WorkerPool;
