//! Caching object resolver.
//!
//! `Library` is the hub the other layers talk to. It fronts the lazy
//! loader with an LRU cache of resolved objects, keeps an overlay of
//! in-memory edits that shadows the file, routes strings and stream
//! payloads through the installed [`SecurityManager`], and offers typed
//! dictionary accessors that chase references as they go.
//!
//! Resolution never fails with an error: a dangling or cyclic reference
//! comes back as `Object::Null` and the condition is logged. Errors are
//! reserved for I/O-level trouble in the stream decoding paths.

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use bytes::Bytes;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::codec;
use crate::error::{Error, Result};
use crate::model::{Dictionary, Name, Object, PdfString, Rect, Reference, Stream, StreamData};

use super::cache::LruMap;
use super::loader::ObjectLoader;
use super::security::SecurityManager;

/// Default capacity of the resolved-object cache.
pub(crate) const OBJECT_CACHE_CAPACITY: usize = 2048;
/// Capacity of the decoded ICC profile cache.
const ICC_CACHE_CAPACITY: usize = 32;

/// A decoded ICC colour profile, cached separately from the object
/// cache because decoding one is much more expensive than re-reading
/// an ordinary object.
#[derive(Debug)]
pub struct IccProfile {
    /// Decoded profile bytes.
    pub data: Bytes,
    /// Component count from the stream dictionary's `/N`, if present.
    pub components: Option<i64>,
}

/// Caching resolver over a lazily loaded document.
pub struct Library {
    cache: Mutex<LruMap<Reference, Object>>,
    pending: RwLock<FxHashMap<Reference, Object>>,
    icc: Mutex<LruMap<Reference, Arc<IccProfile>>>,
    loader: OnceLock<ObjectLoader>,
    security: RwLock<Option<Arc<dyn SecurityManager>>>,
}

impl Library {
    pub fn new() -> Self {
        Self::with_capacity(OBJECT_CACHE_CAPACITY)
    }

    /// Create a library whose object cache holds at most `capacity`
    /// resolved objects. Zero disables caching.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruMap::new(capacity)),
            pending: RwLock::new(FxHashMap::default()),
            icc: Mutex::new(LruMap::new(ICC_CACHE_CAPACITY)),
            loader: OnceLock::new(),
            security: RwLock::new(None),
        }
    }

    /// Wire the loader in once the cross-reference table is known.
    /// Later calls are ignored.
    pub fn install_loader(&self, loader: ObjectLoader) {
        if self.loader.set(loader).is_err() {
            tracing::warn!("object loader already installed");
        }
    }

    pub fn loader(&self) -> Option<&ObjectLoader> {
        self.loader.get()
    }

    /// Install the decryption call-out for encrypted documents.
    pub fn set_security_manager(&self, manager: Arc<dyn SecurityManager>) {
        let Ok(mut slot) = self.security.write() else {
            tracing::warn!("security manager slot poisoned");
            return;
        };
        *slot = Some(manager);
    }

    pub fn security_manager(&self) -> Option<Arc<dyn SecurityManager>> {
        self.security.read().ok()?.as_ref().map(Arc::clone)
    }

    /// Stage an in-memory replacement for `reference`. Subsequent
    /// lookups see the staged object instead of the file's.
    pub fn add(&self, reference: Reference, object: Object) {
        let Ok(mut pending) = self.pending.write() else {
            tracing::warn!("pending overlay poisoned");
            return;
        };
        pending.insert(reference, object);
    }

    /// Drop a staged replacement, reverting `reference` to the file's
    /// version.
    pub fn remove(&self, reference: Reference) {
        let Ok(mut pending) = self.pending.write() else {
            tracing::warn!("pending overlay poisoned");
            return;
        };
        pending.remove(&reference);
    }

    /// Fetch the object behind `reference`, chasing reference chains
    /// until a concrete value turns up. Dangling references and cycles
    /// come back as `Object::Null`.
    pub fn get(&self, reference: Reference) -> Object {
        let mut seen = FxHashSet::default();
        let mut current = reference;
        loop {
            if !seen.insert(current) {
                tracing::warn!(%reference, "reference cycle");
                return Object::Null;
            }
            match self.fetch(current) {
                Object::Reference(next) => current = next,
                other => return other,
            }
        }
    }

    /// One resolution step: overlay, then cache, then the loader.
    fn fetch(&self, reference: Reference) -> Object {
        if let Ok(pending) = self.pending.read()
            && let Some(object) = pending.get(&reference)
        {
            return object.clone();
        }
        if let Ok(mut cache) = self.cache.lock()
            && let Some(object) = cache.get(&reference)
        {
            return object;
        }
        let Some(loader) = self.loader.get() else {
            tracing::debug!(%reference, "no loader installed");
            return Object::Null;
        };
        // The cache lock is not held here, so two threads can race to
        // load the same object. Both get equal values; one insert wins.
        match loader.load(self, reference) {
            Some(object) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(reference, object.clone());
                }
                object
            }
            None => Object::Null,
        }
    }

    /// Resolve `object` if it is a reference, otherwise clone it.
    pub fn resolve(&self, object: &Object) -> Object {
        match object {
            Object::Reference(r) => self.get(*r),
            other => other.clone(),
        }
    }

    /// True if `reference` is known: staged, cached, or present in the
    /// cross-reference table. Does not load the object.
    pub fn is_valid_entry(&self, reference: Reference) -> bool {
        if let Ok(pending) = self.pending.read()
            && pending.contains_key(&reference)
        {
            return true;
        }
        if let Ok(mut cache) = self.cache.lock()
            && cache.get(&reference).is_some()
        {
            return true;
        }
        self.loader
            .get()
            .is_some_and(|loader| loader.xref().contains(reference.num))
    }

    /// Look up `key` and resolve the value. `Null` and missing keys
    /// both come back as `None`.
    pub fn get_object(&self, dict: &Dictionary, key: &str) -> Option<Object> {
        let value = self.resolve(dict.get(key)?);
        if value.is_null() { None } else { Some(value) }
    }

    pub fn get_number(&self, dict: &Dictionary, key: &str) -> Option<f64> {
        self.get_object(dict, key)?.as_number().ok()
    }

    pub fn get_int(&self, dict: &Dictionary, key: &str) -> Option<i64> {
        self.get_object(dict, key)?.as_int().ok()
    }

    pub fn get_bool(&self, dict: &Dictionary, key: &str) -> Option<bool> {
        self.get_object(dict, key)?.as_bool().ok()
    }

    pub fn get_name(&self, dict: &Dictionary, key: &str) -> Option<Name> {
        self.get_object(dict, key)?.as_name().ok().cloned()
    }

    pub fn get_dict(&self, dict: &Dictionary, key: &str) -> Option<Dictionary> {
        self.get_object(dict, key)?.as_dict().ok().cloned()
    }

    pub fn get_array(&self, dict: &Dictionary, key: &str) -> Option<Vec<Object>> {
        self.get_object(dict, key)?.as_array().ok().cloned()
    }

    /// Look up a string value and hand back its decrypted bytes.
    pub fn get_string(&self, dict: &Dictionary, key: &str) -> Option<Vec<u8>> {
        let value = self.get_object(dict, key)?;
        let string = value.as_string().ok()?;
        Some(self.decrypt_string(string))
    }

    /// A rectangle is an array of four numbers, any of which may be
    /// indirect. Lower-left/upper-right normalization is the caller's
    /// business.
    pub fn get_rect(&self, dict: &Dictionary, key: &str) -> Option<Rect> {
        let array = self.get_array(dict, key)?;
        if array.len() < 4 {
            tracing::warn!(key, len = array.len(), "rectangle array too short");
            return None;
        }
        let mut coords = [0f64; 4];
        for (slot, value) in coords.iter_mut().zip(&array) {
            *slot = self.resolve(value).as_number().ok()?;
        }
        Some(Rect::new(coords[0], coords[1], coords[2], coords[3]))
    }

    /// Decrypt a string's bytes through the installed manager. Without
    /// a manager, or for a string parsed outside any indirect object,
    /// the stored bytes are returned as-is.
    pub fn decrypt_string(&self, string: &PdfString) -> Vec<u8> {
        if let Ok(guard) = self.security.read()
            && let Some(manager) = guard.as_ref()
        {
            if let Some(owner) = string.owner {
                return manager.decrypt_string(owner, &string.data);
            }
            tracing::debug!("string has no owner context, serving stored bytes");
        }
        string.data.clone()
    }

    /// Raw stream payload exactly as stored: windowed streams read
    /// their bytes back from the source, buffered streams clone.
    pub fn raw_stream_bytes(&self, stream: &Stream) -> Result<Bytes> {
        match &stream.data {
            StreamData::Buffered(data) => Ok(data.clone()),
            StreamData::Window { offset, length } => {
                let Some(loader) = self.loader.get() else {
                    return Err(Error::Unsupported("stream window without a source"));
                };
                loader.source().read_window(*offset, *length)
            }
        }
    }

    /// Fully decoded stream payload: raw bytes, decrypted if a manager
    /// is installed, then run through the filter chain. The result is
    /// memoized on the stream, so repeat calls are free.
    ///
    /// `owner` is the reference of the object the stream came from;
    /// the security manager needs it for its per-object key.
    pub fn decoded_stream(&self, owner: Reference, stream: &Stream) -> Result<Bytes> {
        if let Some(decoded) = stream.decoded_cached() {
            return Ok(decoded);
        }
        let mut raw = self.raw_stream_bytes(stream)?;
        if let Ok(guard) = self.security.read()
            && let Some(manager) = guard.as_ref()
        {
            raw = Bytes::from(manager.decrypt_stream(owner, &raw));
        }
        let decoded = match self.resolved_filter_dict(&stream.dict) {
            Some(resolved) => codec::decode(&resolved, raw),
            None => codec::decode(&stream.dict, raw),
        };
        Ok(stream.memoize_decoded(decoded))
    }

    /// `/Filter` and `/DecodeParms` may be indirect, or arrays with
    /// indirect members. The codecs only see direct values, so resolve
    /// them up front. `None` means the dictionary is already direct.
    fn resolved_filter_dict(&self, dict: &Dictionary) -> Option<Dictionary> {
        const KEYS: [&str; 3] = ["Filter", "DecodeParms", "DP"];
        if !KEYS
            .iter()
            .any(|key| dict.get(key).is_some_and(filter_needs_resolution))
        {
            return None;
        }
        let mut out = dict.clone();
        for key in KEYS {
            if let Some(value) = dict.get(key)
                && filter_needs_resolution(value)
            {
                let resolved = match self.resolve(value) {
                    Object::Array(items) => {
                        Object::Array(items.iter().map(|item| self.resolve(item)).collect())
                    }
                    other => other,
                };
                out.insert(key, resolved);
            }
        }
        Some(out)
    }

    /// Fetch and decode the ICC profile stream behind `reference`.
    pub fn icc_profile(&self, reference: Reference) -> Option<Arc<IccProfile>> {
        if let Ok(mut cache) = self.icc.lock()
            && let Some(profile) = cache.get(&reference)
        {
            return Some(profile);
        }
        let value = self.get(reference);
        let Ok(stream) = value.as_stream() else {
            tracing::debug!(%reference, "ICC profile reference is not a stream");
            return None;
        };
        let data = match self.decoded_stream(reference, stream) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(%reference, %err, "ICC profile decode failed");
                return None;
            }
        };
        let components = self.get_int(&stream.dict, "N");
        let profile = Arc::new(IccProfile { data, components });
        if let Ok(mut cache) = self.icc.lock() {
            cache.insert(reference, Arc::clone(&profile));
        }
        Some(profile)
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_needs_resolution(value: &Object) -> bool {
    match value {
        Object::Reference(_) => true,
        Object::Array(items) => items.iter().any(|item| matches!(item, Object::Reference(_))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::xref::{CrossReference, XrefSection};
    use crate::io::source::SharedSource;

    fn library_over(data: Vec<u8>, entries: &[(u32, u64)], capacity: usize) -> Library {
        let mut section = XrefSection::new();
        for &(num, offset) in entries {
            section.insert_used(num, offset, 0);
        }
        let mut xref = CrossReference::new();
        xref.push_section(section);
        let library = Library::with_capacity(capacity);
        let source = SharedSource::from_bytes(Bytes::from(data));
        library.install_loader(ObjectLoader::new(source, Arc::new(xref)));
        library
    }

    #[test]
    fn test_overlay_shadows_and_reverts() {
        let library = library_over(b"1 0 obj 42 endobj".to_vec(), &[(1, 0)], 16);
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(42));
        library.add(Reference::new(1, 0), Object::Integer(99));
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(99));
        library.remove(Reference::new(1, 0));
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(42));
    }

    #[test]
    fn test_get_without_loader_is_null() {
        let library = Library::new();
        assert_eq!(library.get(Reference::new(5, 0)), Object::Null);
        library.add(Reference::new(5, 0), Object::Bool(true));
        assert_eq!(library.get(Reference::new(5, 0)), Object::Bool(true));
    }

    #[test]
    fn test_reference_chain_resolves_to_value() {
        let mut data = b"1 0 obj 2 0 R endobj\n".to_vec();
        let second = data.len() as u64;
        data.extend_from_slice(b"2 0 obj 7 endobj");
        let library = library_over(data, &[(1, 0), (2, second)], 16);
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(7));
    }

    #[test]
    fn test_reference_cycle_is_null() {
        let mut data = b"1 0 obj 2 0 R endobj\n".to_vec();
        let second = data.len() as u64;
        data.extend_from_slice(b"2 0 obj 1 0 R endobj");
        let library = library_over(data, &[(1, 0), (2, second)], 16);
        assert_eq!(library.get(Reference::new(1, 0)), Object::Null);
        assert_eq!(library.get(Reference::new(2, 0)), Object::Null);
    }

    #[test]
    fn test_eviction_reloads_transparently() {
        let mut data = b"1 0 obj 10 endobj\n".to_vec();
        let second = data.len() as u64;
        data.extend_from_slice(b"2 0 obj 20 endobj");
        let library = library_over(data, &[(1, 0), (2, second)], 1);
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(10));
        assert_eq!(library.get(Reference::new(2, 0)), Object::Integer(20));
        assert_eq!(library.get(Reference::new(1, 0)), Object::Integer(10));
    }

    #[test]
    fn test_is_valid_entry() {
        let library = library_over(b"1 0 obj 42 endobj".to_vec(), &[(1, 0)], 16);
        assert!(library.is_valid_entry(Reference::new(1, 0)));
        assert!(!library.is_valid_entry(Reference::new(9, 0)));
        library.add(Reference::new(9, 0), Object::Null);
        assert!(library.is_valid_entry(Reference::new(9, 0)));
    }

    #[test]
    fn test_typed_accessors() {
        let mut data = b"1 0 obj 3 endobj\n".to_vec();
        let second = data.len() as u64;
        data.extend_from_slice(b"2 0 obj [0 0 612 1 0 R] endobj");
        let library = library_over(data, &[(1, 0), (2, second)], 16);

        let mut dict = Dictionary::new();
        dict.insert("Count", Object::Reference(Reference::new(1, 0)));
        dict.insert("Kind", Object::Name(Name::new("Page")));
        dict.insert("Box", Object::Reference(Reference::new(2, 0)));
        dict.insert("Gone", Object::Null);

        assert_eq!(library.get_int(&dict, "Count"), Some(3));
        assert_eq!(library.get_number(&dict, "Count"), Some(3.0));
        assert_eq!(library.get_name(&dict, "Kind"), Some(Name::new("Page")));
        assert_eq!(library.get_object(&dict, "Gone"), None);
        assert_eq!(library.get_object(&dict, "Missing"), None);
        // The fourth coordinate is itself indirect.
        let rect = library.get_rect(&dict, "Box").unwrap();
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (0.0, 0.0, 612.0, 3.0));
    }

    #[test]
    fn test_rect_too_short() {
        let library = Library::new();
        let mut dict = Dictionary::new();
        dict.insert(
            "Box",
            Object::Array(vec![Object::Integer(0), Object::Integer(0)]),
        );
        assert!(library.get_rect(&dict, "Box").is_none());
    }

    struct CaseFlip;

    impl SecurityManager for CaseFlip {
        fn decrypt_string(&self, _owner: Reference, data: &[u8]) -> Vec<u8> {
            data.iter().map(|b| b ^ 0x20).collect()
        }

        fn decrypt_stream(&self, _owner: Reference, data: &[u8]) -> Vec<u8> {
            data.iter().map(|b| b ^ 0x20).collect()
        }
    }

    #[test]
    fn test_get_string_decrypts_with_owner() {
        let library = library_over(b"1 0 obj (SECRET) endobj".to_vec(), &[(1, 0)], 16);
        library.set_security_manager(Arc::new(CaseFlip));
        let mut dict = Dictionary::new();
        dict.insert("T", Object::Reference(Reference::new(1, 0)));
        assert_eq!(library.get_string(&dict, "T").unwrap(), b"secret");
    }

    #[test]
    fn test_string_without_manager_is_stored_bytes() {
        let library = library_over(b"1 0 obj (SECRET) endobj".to_vec(), &[(1, 0)], 16);
        let mut dict = Dictionary::new();
        dict.insert("T", Object::Reference(Reference::new(1, 0)));
        assert_eq!(library.get_string(&dict, "T").unwrap(), b"SECRET");
    }

    #[test]
    fn test_decoded_stream_memoizes() {
        let data = b"1 0 obj << /Length 5 >> stream\nHELLO\nendstream endobj".to_vec();
        let library = library_over(data, &[(1, 0)], 16);
        let object = library.get(Reference::new(1, 0));
        let stream = object.as_stream().unwrap();
        assert!(stream.decoded_cached().is_none());
        let decoded = library
            .decoded_stream(Reference::new(1, 0), stream)
            .unwrap();
        assert_eq!(decoded, Bytes::from_static(b"HELLO"));
        assert!(stream.decoded_cached().is_some());
        let again = library
            .decoded_stream(Reference::new(1, 0), stream)
            .unwrap();
        assert_eq!(again, decoded);
    }

    #[test]
    fn test_decoded_stream_decrypts_before_filters() {
        let data = b"1 0 obj << /Length 5 >> stream\nhello\nendstream endobj".to_vec();
        let library = library_over(data, &[(1, 0)], 16);
        library.set_security_manager(Arc::new(CaseFlip));
        let object = library.get(Reference::new(1, 0));
        let stream = object.as_stream().unwrap();
        let decoded = library
            .decoded_stream(Reference::new(1, 0), stream)
            .unwrap();
        assert_eq!(decoded, Bytes::from_static(b"HELLO"));
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        use flate2::{Compression, write::ZlibEncoder};
        use std::io::Write as _;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_indirect_filter_resolved_before_decode() {
        let payload = deflate(b"window contents");
        let mut data = b"2 0 obj /FlateDecode endobj\n".to_vec();
        let stream_offset = data.len() as u64;
        data.extend_from_slice(
            format!(
                "1 0 obj << /Length {} /Filter 2 0 R >> stream\n",
                payload.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream endobj");
        let library = library_over(data, &[(1, stream_offset), (2, 0)], 16);
        let object = library.get(Reference::new(1, 0));
        let stream = object.as_stream().unwrap();
        let decoded = library
            .decoded_stream(Reference::new(1, 0), stream)
            .unwrap();
        assert_eq!(decoded, Bytes::from_static(b"window contents"));
    }

    #[test]
    fn test_icc_profile_cached() {
        let data = b"1 0 obj << /Length 4 /N 3 >> stream\nABCD\nendstream endobj".to_vec();
        let library = library_over(data, &[(1, 0)], 16);
        let first = library.icc_profile(Reference::new(1, 0)).unwrap();
        assert_eq!(first.data, Bytes::from_static(b"ABCD"));
        assert_eq!(first.components, Some(3));
        let second = library.icc_profile(Reference::new(1, 0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_icc_profile_non_stream_is_none() {
        let library = library_over(b"1 0 obj 42 endobj".to_vec(), &[(1, 0)], 16);
        assert!(library.icc_profile(Reference::new(1, 0)).is_none());
    }
}
