//! Byte sources, the shared cursor lock, and the pushback reader.

pub mod reader;
pub mod source;

pub use reader::SourceReader;
pub use source::{ByteSource, FileSource, ForwardSource, MemorySource, SharedSource};
