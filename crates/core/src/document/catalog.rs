//! Document bootstrap: header, trailer chain, recovery, lifetime.
//!
//! `Document::open` and friends build the shared source, walk the
//! cross-reference chain from the tail `startxref`, wire a loader into
//! a fresh [`Library`], and locate the root catalog. Chain damage is
//! not fatal: any failure up to and including an unresolvable root
//! falls back to a linear scan of the whole file that fabricates a
//! table from `N G obj` headers. Only a document with no locatable
//! catalog at all refuses to open.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use memmap2::Mmap;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::io::source::SharedSource;
use crate::model::{Dictionary, Object, Reference};
use crate::parser::{ObjectParser, Outcome};
use crate::pool::WorkerPool;

use super::library::{Library, OBJECT_CACHE_CAPACITY};
use super::loader::{CONTAINER_CACHE_CAPACITY, ObjectLoader};
use super::security::SecurityManager;
use super::xref::{CrossReference, Trailer, XrefSection};

/// How much of the head and tail to scan for the `%PDF-` header and
/// the `startxref` keyword.
const EDGE_SCAN_WINDOW: u64 = 1024;

static OBJ_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+(\d+)\s+obj\b").unwrap());

/// Knobs for [`Document`] construction.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Resolved-object cache capacity. Zero disables caching.
    pub cache_capacity: usize,
    /// Opened compressed-container cache capacity. Zero disables it.
    pub container_cache_capacity: usize,
    /// Worker threads for background prefetching. Minimum 1.
    pub worker_threads: usize,
    /// Skip the trailer chain entirely and build the table by scanning
    /// the file for object headers.
    pub force_scan: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_capacity: OBJECT_CACHE_CAPACITY,
            container_cache_capacity: CONTAINER_CACHE_CAPACITY,
            worker_threads: default_worker_threads(),
            force_scan: false,
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get().min(4))
}

/// An open PDF document.
pub struct Document {
    xref: Arc<CrossReference>,
    trailers: Vec<Trailer>,
    library: Arc<Library>,
    pool: WorkerPool,
    version: Option<(u8, u8)>,
    recovered: bool,
    catalog_ref: Reference,
    catalog: Dictionary,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("recovered", &self.recovered)
            .field("catalog_ref", &self.catalog_ref)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, LoadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let source = SharedSource::open(path)?;
        Self::bootstrap(source, options)
    }

    pub fn from_bytes(data: Bytes) -> Result<Self> {
        Self::from_bytes_with(data, LoadOptions::default())
    }

    pub fn from_bytes_with(data: Bytes, options: LoadOptions) -> Result<Self> {
        Self::bootstrap(SharedSource::from_bytes(data), options)
    }

    pub fn from_mmap(mmap: Mmap) -> Result<Self> {
        Self::from_mmap_with(mmap, LoadOptions::default())
    }

    pub fn from_mmap_with(mmap: Mmap, options: LoadOptions) -> Result<Self> {
        Self::bootstrap(SharedSource::from_mmap(mmap), options)
    }

    /// Open from a plain reader. The trailer chain needs random
    /// access, so the whole reader is buffered up front.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::from_reader_with(reader, LoadOptions::default())
    }

    pub fn from_reader_with(mut reader: impl Read, options: LoadOptions) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_bytes_with(Bytes::from(buf), options)
    }

    fn bootstrap(source: SharedSource, options: LoadOptions) -> Result<Self> {
        let version = read_version(&source);
        if version.is_none() {
            tracing::warn!("no %PDF header found");
        }

        let primary = if options.force_scan {
            None
        } else {
            load_primary(&source)
        };

        let (xref, trailers, recovered, (catalog_ref, catalog)) = match primary {
            Some((xref, trailers)) => {
                if let Some(found) = probe_catalog(&source, &xref, &trailers) {
                    (xref, trailers, false, found)
                } else {
                    tracing::warn!("root unresolvable through trailer chain, rescanning");
                    let (xref, trailers, found) = recover(&source)?;
                    (xref, trailers, true, found)
                }
            }
            None => {
                let (xref, trailers, found) = recover(&source)?;
                (xref, trailers, true, found)
            }
        };

        let library = Arc::new(Library::with_capacity(options.cache_capacity));
        library.install_loader(ObjectLoader::with_capacity(
            source,
            Arc::clone(&xref),
            options.container_cache_capacity,
        ));

        if trailers.iter().any(|t| t.encrypt().is_some()) {
            tracing::warn!(
                "document is encrypted; install a security manager to read its strings and streams"
            );
        }

        let pool = WorkerPool::new(options.worker_threads)?;

        Ok(Self {
            xref,
            trailers,
            library,
            pool,
            version,
            recovered,
            catalog_ref,
            catalog,
        })
    }

    /// Header version, when a `%PDF-M.N` marker was found.
    pub fn version(&self) -> Option<(u8, u8)> {
        self.version
    }

    /// True when the cross-reference table came from the linear
    /// recovery scan rather than the trailer chain.
    pub fn recovered(&self) -> bool {
        self.recovered
    }

    /// The newest trailer.
    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailers.first()
    }

    /// All trailers, newest first.
    pub fn trailers(&self) -> &[Trailer] {
        &self.trailers
    }

    pub fn xref(&self) -> &CrossReference {
        &self.xref
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// The root catalog dictionary.
    pub fn catalog(&self) -> &Dictionary {
        &self.catalog
    }

    pub fn catalog_ref(&self) -> Reference {
        self.catalog_ref
    }

    /// Resolve the `/Info` dictionary, when the trailer names one.
    pub fn info(&self) -> Option<Dictionary> {
        let reference = self.trailers.iter().find_map(Trailer::info)?;
        self.library.get(reference).as_dict().ok().cloned()
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailers.iter().any(|t| t.encrypt().is_some())
    }

    /// Resolve the `/Encrypt` dictionary, when present.
    pub fn encrypt_dict(&self) -> Option<Dictionary> {
        let encrypt = self.trailers.iter().find_map(|t| t.encrypt().cloned())?;
        self.library.resolve(&encrypt).as_dict().ok().cloned()
    }

    /// The `/ID` byte strings from the newest trailer that carries
    /// them. Never decrypted: file identifiers stay plaintext even in
    /// encrypted documents.
    pub fn document_id(&self) -> Option<Vec<Vec<u8>>> {
        let id = self.trailers.iter().find_map(|t| t.id().cloned())?;
        let parts: Vec<Vec<u8>> = id
            .iter()
            .filter_map(|o| o.as_string().ok().map(|s| s.data.clone()))
            .collect();
        if parts.is_empty() { None } else { Some(parts) }
    }

    pub fn set_security_manager(&self, manager: Arc<dyn SecurityManager>) {
        self.library.set_security_manager(manager);
    }

    /// Convenience passthrough to [`Library::get`].
    pub fn get(&self, reference: Reference) -> Object {
        self.library.get(reference)
    }

    /// Object numbers reachable through the table, sorted.
    pub fn live_objects(&self) -> Vec<u32> {
        self.xref.live_objects()
    }

    /// Queue background loads so later `get` calls hit the cache.
    pub fn prefetch(&self, refs: &[Reference]) {
        for &reference in refs {
            let library = Arc::clone(&self.library);
            self.pool.spawn(move || {
                library.get(reference);
            });
        }
    }

    /// Tear down the worker pool. Also happens on drop; calling it
    /// twice is fine.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

/// Scan the head window for `%PDF-M.N`.
fn read_version(source: &SharedSource) -> Option<(u8, u8)> {
    const NEEDLE: &[u8] = b"%PDF-";
    let head = source.read_window(0, EDGE_SCAN_WINDOW).ok()?;
    let at = head.windows(NEEDLE.len()).position(|w| w == NEEDLE)?;
    let rest = &head[at + NEEDLE.len()..];

    let mut pos = 0;
    let mut major: u32 = 0;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        major = major.saturating_mul(10) + u32::from(rest[pos] - b'0');
        pos += 1;
    }
    if pos == 0 || pos >= rest.len() || rest[pos] != b'.' {
        return None;
    }
    pos += 1;
    let minor_start = pos;
    let mut minor: u32 = 0;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        minor = minor.saturating_mul(10) + u32::from(rest[pos] - b'0');
        pos += 1;
    }
    if pos == minor_start {
        return None;
    }
    Some((major.min(255) as u8, minor.min(255) as u8))
}

/// Scan the tail window for the last `startxref` and its operand.
fn find_startxref(source: &SharedSource) -> Result<u64> {
    const NEEDLE: &[u8] = b"startxref";
    let Some(len) = source.len() else {
        return Err(Error::NoValidXref);
    };
    let start = len.saturating_sub(EDGE_SCAN_WINDOW);
    let tail = source.read_window(start, len - start)?;
    let Some(at) = tail.windows(NEEDLE.len()).rposition(|w| w == NEEDLE) else {
        return Err(Error::NoValidXref);
    };

    let rest = &tail[at + NEEDLE.len()..];
    let mut pos = 0;
    while pos < rest.len() && rest[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let digits = pos;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits {
        return Err(Error::NoValidXref);
    }
    let text = std::str::from_utf8(&rest[digits..pos]).map_err(|_| Error::NoValidXref)?;
    text.parse().map_err(|_| Error::NoValidXref)
}

/// Parse whatever cross-reference data sits at `offset`: a classic
/// `xref` section with its trailer, or an XRef stream object. Both
/// come back as a [`Trailer`].
fn read_trailer_at(source: &SharedSource, offset: u64) -> Result<Trailer> {
    source.with_cursor(|cur| {
        let mut parser = ObjectParser::at_offset(&mut *cur, offset)?;
        match parser.next_object()? {
            Outcome::Trailer(trailer) => Ok(trailer),
            _ => Err(Error::Syntax(format!(
                "no cross-reference data at offset {offset}"
            ))),
        }
    })
}

/// Walk the trailer chain from the tail `startxref`.
fn load_primary(source: &SharedSource) -> Option<(Arc<CrossReference>, Vec<Trailer>)> {
    let start = match find_startxref(source) {
        Ok(pos) => pos,
        Err(err) => {
            tracing::warn!(%err, "startxref not found");
            return None;
        }
    };
    match load_xref_chain(source, start) {
        Ok((xref, trailers)) if !xref.is_empty() => Some((Arc::new(xref), trailers)),
        Ok(_) => {
            tracing::warn!("cross-reference chain has no usable sections");
            None
        }
        Err(err) => {
            tracing::warn!(%err, "cross-reference chain unusable");
            None
        }
    }
}

fn load_xref_chain(source: &SharedSource, start: u64) -> Result<(CrossReference, Vec<Trailer>)> {
    let mut xref = CrossReference::new();
    let mut trailers = Vec::new();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut next = Some(start);

    while let Some(pos) = next {
        if !visited.insert(pos) {
            tracing::warn!(offset = pos, "cross-reference chain loops, stopping");
            break;
        }
        let mut trailer = match read_trailer_at(source, pos) {
            Ok(t) => t,
            Err(err) => {
                if trailers.is_empty() {
                    return Err(err);
                }
                tracing::warn!(offset = pos, %err, "broken link in cross-reference chain");
                break;
            }
        };

        next = trailer.prev();
        let host_section = trailer.xref.take();
        let stm_pos = trailer.xref_stm();
        trailers.push(trailer);

        // Hybrid files keep stream-resident objects on the classic
        // free list, so the stream section must be consulted before
        // its host or those placeholders would hide the real entries.
        if let Some(stm_pos) = stm_pos
            && visited.insert(stm_pos)
        {
            match read_trailer_at(source, stm_pos) {
                Ok(mut stm) => {
                    if let Some(section) = stm.xref.take() {
                        xref.push_section(section);
                    }
                    trailers.push(stm);
                }
                Err(err) => {
                    tracing::warn!(offset = stm_pos, %err, "hybrid xref stream unreadable");
                }
            }
        }

        if let Some(section) = host_section {
            xref.push_section(section);
        }
    }

    Ok((xref, trailers))
}

/// Resolve the first `/Root` across the trailers, newest first.
fn probe_catalog(
    source: &SharedSource,
    xref: &Arc<CrossReference>,
    trailers: &[Trailer],
) -> Option<(Reference, Dictionary)> {
    let probe = Library::with_capacity(8);
    probe.install_loader(ObjectLoader::new(source.clone(), Arc::clone(xref)));
    for trailer in trailers {
        let Some(root) = trailer.root() else { continue };
        let value = probe.get(root);
        match value.as_dict() {
            Ok(dict) => return Some((root, dict.clone())),
            Err(_) => {
                if !value.is_null() {
                    tracing::warn!(%root, "trailer root is not a dictionary");
                }
            }
        }
    }
    None
}

fn recover(
    source: &SharedSource,
) -> Result<(Arc<CrossReference>, Vec<Trailer>, (Reference, Dictionary))> {
    let (xref, trailers) = recover_by_scan(source)?;
    let Some(found) = probe_catalog(source, &xref, &trailers) else {
        return Err(Error::NoCatalog);
    };
    Ok((xref, trailers, found))
}

/// Last-resort table: scan the whole source for `N G obj` headers and
/// fabricate Used entries. The newest copy of each object number in
/// file order wins, matching incremental-update semantics.
fn recover_by_scan(source: &SharedSource) -> Result<(Arc<CrossReference>, Vec<Trailer>)> {
    let Some(len) = source.len() else {
        return Err(Error::NoValidXref);
    };
    let data = source.read_window(0, len)?;

    let mut section = XrefSection::new();
    for cap in OBJ_HEADER.captures_iter(&data) {
        let Some(whole) = cap.get(0) else { continue };
        let Some(num) = parse_decimal::<u32>(&cap[1]) else {
            continue;
        };
        let r#gen = parse_decimal::<u32>(&cap[2]).unwrap_or(0);
        section.insert_used(
            num,
            whole.start() as u64,
            r#gen.min(u32::from(u16::MAX)) as u16,
        );
    }
    if section.is_empty() {
        tracing::warn!("recovery scan found no object headers");
        return Err(Error::NoValidXref);
    }
    tracing::warn!(objects = section.len(), "cross-reference table rebuilt by scan");

    let mut xref = CrossReference::new();
    xref.push_section(section);
    let xref = Arc::new(xref);

    let mut trailer = None;
    if let Some(at) = data.windows(b"trailer".len()).rposition(|w| w == b"trailer") {
        match read_trailer_at(source, at as u64) {
            Ok(t) if t.dict.contains("Root") => trailer = Some(t),
            Ok(_) => tracing::debug!("scanned trailer has no /Root"),
            Err(err) => tracing::debug!(%err, "scanned trailer unreadable"),
        }
    }

    let probe = Library::with_capacity(8);
    probe.install_loader(ObjectLoader::new(source.clone(), Arc::clone(&xref)));

    if let Some(t) = trailer.as_ref() {
        let resolves = t.root().is_some_and(|r| !probe.get(r).is_null());
        if !resolves {
            tracing::debug!("scanned trailer root does not resolve, discarding");
            trailer = None;
        }
    }

    if trailer.is_none() {
        // No usable trailer dictionary: point the root at a scanned
        // catalog object instead.
        for num in xref.live_objects() {
            let reference = Reference::new(num, 0);
            let value = probe.get(reference);
            let Ok(dict) = value.as_dict() else { continue };
            if probe
                .get_name(dict, "Type")
                .is_some_and(|n| n.as_str() == "Catalog")
            {
                tracing::warn!(object = num, "synthesizing trailer from scanned catalog");
                let mut synthesized = Dictionary::new();
                synthesized.insert("Root", Object::Reference(reference));
                trailer = Some(Trailer::new(synthesized, None, 0));
                break;
            }
        }
    }

    let Some(trailer) = trailer else {
        return Err(Error::NoCatalog);
    };
    Ok((xref, vec![trailer]))
}

fn parse_decimal<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
