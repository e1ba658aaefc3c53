//! PDF data model - objects, streams, and subtype dispatch.
//!
//! - `objects` - value types (Object, Reference, Name, PdfString, Dictionary)
//! - `stream` - stream objects with lazily materialized payloads
//! - `typed` - dictionary/stream subtype classification

pub mod objects;
pub mod stream;
pub mod typed;

// Re-export main types for convenience
pub use objects::{Dictionary, Name, Object, PdfString, Rect, Reference, StringKind};
pub use stream::{Stream, StreamData};
pub use typed::{ObjectKind, StreamKind};
