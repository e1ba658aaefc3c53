//! Document structure: cross-reference tables, lazy loading, caching
//! resolution, and bootstrap.
//!
//! - `xref` - cross-reference sections, chained tables, trailers
//! - `loader` - on-demand object parsing, compressed containers
//! - `library` - caching resolver and typed accessors
//! - `catalog` - document open/bootstrap and recovery
//! - `security` - decryption call-out interface
//! - `cache` - the shared LRU building block

pub(crate) mod cache;
pub mod catalog;
pub mod library;
pub mod loader;
pub mod security;
pub mod xref;

pub use catalog::{Document, LoadOptions};
pub use library::{IccProfile, Library};
pub use loader::ObjectLoader;
pub use security::SecurityManager;
pub use xref::{CrossReference, Trailer, XrefEntry, XrefSection};
