//! Lazy object loading through the cross-reference table.
//!
//! Objects are parsed on demand: in-use entries seek the shared cursor
//! to their recorded offset, compressed entries go through a bounded
//! cache of opened containers. Load failures are logged and surface as
//! absence, never as panics.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::cache::LruMap;
use super::library::Library;
use super::xref::{CrossReference, XrefEntry};
use crate::error::{Error, Result};
use crate::io::{MemorySource, SharedSource};
use crate::model::{Object, Reference, StreamKind};
use crate::parser::{Lexer, ObjectParser, Outcome, Token};

pub(crate) const CONTAINER_CACHE_CAPACITY: usize = 256;

thread_local! {
    /// Containers being opened on this thread. A corrupt table can
    /// claim a container lives inside itself; without the guard that
    /// would recurse forever under the container lock.
    static OPENING_CONTAINERS: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

pub struct ObjectLoader {
    source: SharedSource,
    xref: Arc<CrossReference>,
    containers: Mutex<LruMap<u32, Arc<ObjectStreamView>>>,
}

impl ObjectLoader {
    pub fn new(source: SharedSource, xref: Arc<CrossReference>) -> Self {
        Self::with_capacity(source, xref, CONTAINER_CACHE_CAPACITY)
    }

    /// Same, with an explicit bound on the opened-container cache.
    pub fn with_capacity(
        source: SharedSource,
        xref: Arc<CrossReference>,
        containers: usize,
    ) -> Self {
        Self {
            source,
            xref,
            containers: Mutex::new(LruMap::new(containers)),
        }
    }

    pub fn xref(&self) -> &CrossReference {
        &self.xref
    }

    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    /// Load the object behind `reference`. `None` means the reference
    /// does not resolve: no table entry, a free tombstone, or a parse
    /// failure (logged).
    pub fn load(&self, library: &Library, reference: Reference) -> Option<Object> {
        match self.xref.entry(reference.num)? {
            XrefEntry::Used { offset, r#gen } => {
                if r#gen != reference.r#gen {
                    tracing::debug!(
                        %reference,
                        table_gen = r#gen,
                        "generation mismatch against xref entry"
                    );
                }
                self.parse_at(offset, reference.num)
            }
            XrefEntry::Compressed { container, index } => {
                // Lock order: containers before the source cursor. The
                // lock is held across the miss so a container is parsed
                // at most once under concurrency.
                let Ok(mut containers) = self.containers.lock() else {
                    tracing::warn!("container cache lock poisoned");
                    return None;
                };
                let view = self.container_view(&mut containers, library, container)?;
                drop(containers);
                view.value_at(index as usize, reference.num)
            }
        }
    }

    /// Parse the indirect object at `offset`, restoring the cursor
    /// afterwards. The header's object number must match the table's.
    fn parse_at(&self, offset: u64, expected: u32) -> Option<Object> {
        let outcome = self.source.with_cursor(|cur| {
            let saved = cur.position();
            let outcome = (|| -> Result<Outcome> {
                let mut parser = ObjectParser::at_offset(&mut *cur, offset)?;
                parser.next_object()
            })();
            if cur.is_seekable() {
                let _ = cur.seek(SeekFrom::Start(saved));
            }
            outcome
        });
        match outcome {
            Ok(Outcome::Object(ind)) => {
                if ind.reference.num != expected {
                    tracing::warn!(
                        offset,
                        expected,
                        found = ind.reference.num,
                        "object header does not match xref entry"
                    );
                    return None;
                }
                Some(ind.object)
            }
            Ok(_) => {
                tracing::debug!(offset, expected, "no indirect object at offset");
                None
            }
            Err(err) => {
                tracing::warn!(offset, expected, %err, "object load failed");
                None
            }
        }
    }

    /// Cached view of container `num`, opening it on a miss. Runs with
    /// the container lock held; nested containers recurse through the
    /// same guard-held map instead of re-locking.
    fn container_view(
        &self,
        containers: &mut LruMap<u32, Arc<ObjectStreamView>>,
        library: &Library,
        num: u32,
    ) -> Option<Arc<ObjectStreamView>> {
        if let Some(view) = containers.get(&num) {
            return Some(view);
        }
        let cycling = OPENING_CONTAINERS.with(|open| open.borrow().contains(&num));
        if cycling {
            tracing::warn!(container = num, "object stream claims to contain itself");
            return None;
        }
        OPENING_CONTAINERS.with(|open| open.borrow_mut().push(num));
        let view = self.open_container(containers, library, num);
        OPENING_CONTAINERS.with(|open| {
            open.borrow_mut().pop();
        });
        if let Some(view) = &view {
            containers.insert(num, Arc::clone(view));
        }
        view
    }

    fn open_container(
        &self,
        containers: &mut LruMap<u32, Arc<ObjectStreamView>>,
        library: &Library,
        num: u32,
    ) -> Option<Arc<ObjectStreamView>> {
        let object = match self.xref.entry(num)? {
            XrefEntry::Used { offset, .. } => self.parse_at(offset, num)?,
            XrefEntry::Compressed { container, index } => {
                let view = self.container_view(containers, library, container)?;
                view.value_at(index as usize, num)?
            }
        };
        let Object::Stream(stream) = object else {
            tracing::warn!(container = num, "container entry is not a stream");
            return None;
        };
        if stream.kind != StreamKind::ObjectStream {
            tracing::warn!(container = num, kind = ?stream.kind, "container lacks /Type /ObjStm");
        }
        let data = match library.decoded_stream(Reference::new(num, 0), &stream) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(container = num, %err, "container payload decode failed");
                return None;
            }
        };
        match ObjectStreamView::parse(&stream.dict, data) {
            Ok(view) => Some(Arc::new(view)),
            Err(err) => {
                tracing::warn!(container = num, %err, "container header parse failed");
                None
            }
        }
    }
}

/// Decoded object stream: the header's `N` pairs of
/// `object-number offset` plus the payload they index into.
#[derive(Debug)]
pub struct ObjectStreamView {
    data: Bytes,
    first: u64,
    entries: Vec<(u32, u64)>,
}

impl ObjectStreamView {
    /// Read the header pairs from the first `/First` bytes.
    pub fn parse(dict: &crate::model::Dictionary, data: Bytes) -> Result<Self> {
        let n = dict.get("N").and_then(|o| o.as_int().ok()).unwrap_or(-1);
        let first = dict.get("First").and_then(|o| o.as_int().ok()).unwrap_or(-1);
        if n < 0 || first < 0 {
            return Err(Error::Syntax("object stream missing N or First".into()));
        }
        let first = (first as usize).min(data.len());

        let mut header = MemorySource::new(data.slice(..first));
        let mut lexer = Lexer::new(&mut header);
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let num = match lexer.next_token()? {
                Some(Token::Integer(v)) if v >= 0 => v as u32,
                _ => {
                    tracing::warn!(parsed = entries.len(), expected = n, "truncated object stream header");
                    break;
                }
            };
            let offset = match lexer.next_token()? {
                Some(Token::Integer(v)) if v >= 0 => v as u64,
                _ => {
                    tracing::warn!(parsed = entries.len(), expected = n, "truncated object stream header");
                    break;
                }
            };
            entries.push((num, offset));
        }

        Ok(Self {
            data,
            first: first as u64,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the value at header slot `index`. A header number that
    /// disagrees with the requested object warns but the value is
    /// returned anyway: the table's index wins.
    pub fn value_at(&self, index: usize, expected: u32) -> Option<Object> {
        let Some(&(num, rel)) = self.entries.get(index) else {
            tracing::warn!(index, len = self.entries.len(), "object stream index out of range");
            return None;
        };
        if num != expected {
            tracing::warn!(index, expected, header = num, "object stream header mismatch");
        }
        let abs = self.first + rel;
        if abs >= self.data.len() as u64 {
            tracing::warn!(index, offset = abs, "object stream offset past payload");
            return None;
        }

        // Member strings stay unstamped: the container payload was
        // decrypted as a whole, so they are exempt from the per-string
        // security-manager pass.
        let mut src = MemorySource::new(self.data.clone());
        let parsed = (|| -> Result<Object> {
            let mut parser = ObjectParser::at_offset(&mut src, abs)?;
            parser.next_value()
        })();
        match parsed {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(index, offset = abs, %err, "compressed object parse failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::xref::XrefSection;
    use crate::model::Dictionary;

    fn objstm_dict(n: i64, first: i64) -> Dictionary {
        let mut d = Dictionary::new();
        d.insert("N", Object::Integer(n));
        d.insert("First", Object::Integer(first));
        d
    }

    #[test]
    fn test_view_parses_header_and_values() {
        // Two objects: 11 -> dict at 0, 14 -> integer at 9
        let payload = b"11 0 14 9 <</A 1>> 42";
        let dict = objstm_dict(2, 10);
        let view = ObjectStreamView::parse(&dict, Bytes::from_static(payload)).unwrap();
        assert_eq!(view.len(), 2);

        let first = view.value_at(0, 11).unwrap();
        assert_eq!(
            first.as_dict().unwrap().get("A"),
            Some(&Object::Integer(1))
        );
        let second = view.value_at(1, 14).unwrap();
        assert_eq!(second, Object::Integer(42));
    }

    #[test]
    fn test_view_header_mismatch_returns_value() {
        let payload = b"11 0 99";
        let dict = objstm_dict(1, 5);
        let view = ObjectStreamView::parse(&dict, Bytes::from_static(payload)).unwrap();
        // Requested number disagrees with the header; the value still
        // comes back
        assert_eq!(view.value_at(0, 12), Some(Object::Integer(99)));
    }

    #[test]
    fn test_view_index_out_of_range() {
        let payload = b"11 0 99";
        let view =
            ObjectStreamView::parse(&objstm_dict(1, 5), Bytes::from_static(payload)).unwrap();
        assert_eq!(view.value_at(3, 11), None);
    }

    #[test]
    fn test_view_missing_header_keys_is_error() {
        assert!(ObjectStreamView::parse(&Dictionary::new(), Bytes::new()).is_err());
    }

    #[test]
    fn test_load_used_entry() {
        let src = SharedSource::from_bytes(Bytes::from_static(b"1 0 obj 42 endobj"));
        let mut section = XrefSection::new();
        section.insert_used(1, 0, 0);
        let mut xref = CrossReference::new();
        xref.push_section(section);
        let loader = ObjectLoader::new(src, Arc::new(xref));
        let library = Library::new();

        assert_eq!(
            loader.load(&library, Reference::new(1, 0)),
            Some(Object::Integer(42))
        );
        // No entry
        assert_eq!(loader.load(&library, Reference::new(2, 0)), None);
    }

    #[test]
    fn test_load_header_mismatch_is_absent() {
        let src = SharedSource::from_bytes(Bytes::from_static(b"9 0 obj 42 endobj"));
        let mut section = XrefSection::new();
        section.insert_used(1, 0, 0);
        let mut xref = CrossReference::new();
        xref.push_section(section);
        let loader = ObjectLoader::new(src, Arc::new(xref));
        let library = Library::new();

        assert_eq!(loader.load(&library, Reference::new(1, 0)), None);
    }

    #[test]
    fn test_load_compressed_entry() {
        // Container 5 holds object 7 (the integer 99)
        let mut data = Vec::new();
        data.extend_from_slice(b"5 0 obj << /Type /ObjStm /N 1 /First 4 /Length 6 >> stream\n");
        data.extend_from_slice(b"7 0 99");
        data.extend_from_slice(b"\nendstream endobj");

        let src = SharedSource::from_bytes(Bytes::from(data));
        let mut section = XrefSection::new();
        section.insert_used(5, 0, 0);
        section.insert_compressed(7, 5, 0);
        let mut xref = CrossReference::new();
        xref.push_section(section);
        let loader = ObjectLoader::new(src, Arc::new(xref));
        let library = Library::new();

        assert_eq!(
            loader.load(&library, Reference::new(7, 0)),
            Some(Object::Integer(99))
        );
        // Second load hits the container cache
        assert_eq!(
            loader.load(&library, Reference::new(7, 0)),
            Some(Object::Integer(99))
        );
    }

    #[test]
    fn test_self_referential_container_is_absent() {
        let src = SharedSource::from_bytes(Bytes::new());
        let mut section = XrefSection::new();
        section.insert_compressed(9, 9, 0);
        let mut xref = CrossReference::new();
        xref.push_section(section);
        let loader = ObjectLoader::new(src, Arc::new(xref));
        let library = Library::new();

        assert_eq!(loader.load(&library, Reference::new(9, 0)), None);
    }
}
