//! Decryption call-out interface.
//!
//! The core never implements encryption algorithms. A document that
//! carries an `/Encrypt` dictionary needs a manager installed by the
//! embedder before string and stream contents come out readable; until
//! then they are served as stored. Both hooks receive the reference of
//! the object that owns the data, which the standard security handlers
//! fold into their per-object keys.

use crate::model::Reference;

/// Implemented by embedders that know how to decrypt document content.
pub trait SecurityManager: Send + Sync {
    /// Decrypt a string's raw bytes in the context of its owning object.
    fn decrypt_string(&self, owner: Reference, data: &[u8]) -> Vec<u8>;

    /// Decrypt a stream payload. Runs before any stream filters.
    fn decrypt_stream(&self, owner: Reference, data: &[u8]) -> Vec<u8>;
}
