//! Cross-reference tables: entries, update sections, and precedence.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::model::{Dictionary, Object, Reference};

/// Where a live object can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// At a byte offset in the file.
    Used { offset: u64, r#gen: u16 },
    /// At an index inside a compressed object stream.
    Compressed { container: u32, index: u32 },
}

/// Stored form. Free entries are kept as tombstones: a newer update
/// freeing an object must shadow an older in-use entry instead of
/// falling through to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawEntry {
    Free,
    Used { offset: u64, r#gen: u16 },
    Compressed { container: u32, index: u32 },
}

/// Entries contributed by one update (one classic table section or one
/// cross-reference stream).
#[derive(Debug, Clone, Default)]
pub struct XrefSection {
    entries: FxHashMap<u32, RawEntry>,
}

impl XrefSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert_used(&mut self, num: u32, offset: u64, r#gen: u16) {
        self.entries.insert(num, RawEntry::Used { offset, r#gen });
    }

    pub fn insert_compressed(&mut self, num: u32, container: u32, index: u32) {
        self.entries
            .insert(num, RawEntry::Compressed { container, index });
    }

    pub fn insert_free(&mut self, num: u32) {
        self.entries.insert(num, RawEntry::Free);
    }

    fn get(&self, num: u32) -> Option<RawEntry> {
        self.entries.get(&num).copied()
    }

    /// Object numbers recorded by this section, free tombstones
    /// included.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Ingest a decoded cross-reference stream payload.
    ///
    /// `/W` gives the three field widths (a zero-width first field
    /// defaults the entry type to 1/in-use), `/Index` the subsection
    /// ranges (defaulting to `[0 Size]`). Fields are big-endian.
    /// Unknown entry types are skipped; a truncated payload stops
    /// ingestion.
    pub fn from_stream(dict: &Dictionary, data: &[u8]) -> Result<Self> {
        let widths = dict
            .get("W")
            .and_then(|o| o.as_array().ok())
            .ok_or_else(|| Error::Syntax("xref stream missing /W".into()))?;
        if widths.len() < 3 {
            return Err(Error::Syntax("xref stream /W needs 3 fields".into()));
        }
        let w0 = widths[0].as_int().unwrap_or(0).max(0) as usize;
        let w1 = widths[1].as_int().unwrap_or(0).max(0) as usize;
        let w2 = widths[2].as_int().unwrap_or(0).max(0) as usize;
        let entry_size = w0 + w1 + w2;
        if entry_size == 0 {
            return Err(Error::Syntax("xref stream /W is all zero".into()));
        }

        let index: Vec<(u32, usize)> = match dict.get("Index").and_then(|o| o.as_array().ok()) {
            Some(arr) => {
                let mut pairs = Vec::new();
                let mut i = 0;
                while i + 1 < arr.len() {
                    let start = arr[i].as_int().unwrap_or(0).max(0) as u32;
                    let count = arr[i + 1].as_int().unwrap_or(0).max(0) as usize;
                    pairs.push((start, count));
                    i += 2;
                }
                pairs
            }
            None => {
                let size = dict
                    .get("Size")
                    .and_then(|o| o.as_int().ok())
                    .ok_or_else(|| Error::Syntax("xref stream missing /Size".into()))?;
                vec![(0, size.max(0) as usize)]
            }
        };

        let mut section = Self::new();
        let mut pos = 0usize;
        'ranges: for (start, count) in index {
            for i in 0..count {
                if pos + entry_size > data.len() {
                    tracing::warn!(
                        have = data.len(),
                        need = pos + entry_size,
                        "truncated xref stream payload"
                    );
                    break 'ranges;
                }
                let num = start + i as u32;
                let entry_type = if w0 > 0 {
                    read_be(&data[pos..pos + w0])
                } else {
                    1
                };
                let field1 = read_be(&data[pos + w0..pos + w0 + w1]);
                let field2 = read_be(&data[pos + w0 + w1..pos + entry_size]);
                pos += entry_size;

                match entry_type {
                    0 => section.insert_free(num),
                    1 => section.insert_used(num, field1, field2.min(u16::MAX as u64) as u16),
                    2 => section.insert_compressed(
                        num,
                        field1.min(u32::MAX as u64) as u32,
                        field2.min(u32::MAX as u64) as u32,
                    ),
                    t => {
                        tracing::warn!(num, entry_type = t, "unknown xref entry type skipped");
                    }
                }
            }
        }

        Ok(section)
    }
}

fn read_be(bytes: &[u8]) -> u64 {
    let mut val: u64 = 0;
    for &b in bytes {
        val = (val << 8) | b as u64;
    }
    val
}

/// All update sections of a document, most recent first. Lookup walks
/// the sections in order; the first one that mentions an object number
/// decides (a free tombstone decides "absent").
#[derive(Debug, Default)]
pub struct CrossReference {
    sections: Vec<XrefSection>,
}

impl CrossReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section. Sections are pushed in discovery order, which
    /// runs from the newest update backwards through `/Prev` links.
    pub fn push_section(&mut self, section: XrefSection) {
        self.sections.push(section);
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(XrefSection::is_empty)
    }

    /// Resolve an object number to its live entry, if any.
    pub fn entry(&self, num: u32) -> Option<XrefEntry> {
        for section in &self.sections {
            match section.get(num) {
                Some(RawEntry::Free) => return None,
                Some(RawEntry::Used { offset, r#gen }) => {
                    return Some(XrefEntry::Used { offset, r#gen });
                }
                Some(RawEntry::Compressed { container, index }) => {
                    return Some(XrefEntry::Compressed { container, index });
                }
                None => {}
            }
        }
        None
    }

    pub fn contains(&self, num: u32) -> bool {
        self.entry(num).is_some()
    }

    /// All object numbers with a live entry, ascending.
    pub fn live_objects(&self) -> Vec<u32> {
        let mut nums: Vec<u32> = self
            .sections
            .iter()
            .flat_map(XrefSection::object_numbers)
            .collect();
        nums.sort_unstable();
        nums.dedup();
        nums.retain(|&n| self.contains(n));
        nums
    }
}

/// Trailer record: the dictionary plus the xref section found with it
/// and the offset it was parsed from.
#[derive(Debug, Clone)]
pub struct Trailer {
    pub dict: Dictionary,
    pub xref: Option<XrefSection>,
    pub offset: u64,
}

impl Trailer {
    pub fn new(dict: Dictionary, xref: Option<XrefSection>, offset: u64) -> Self {
        Self { dict, xref, offset }
    }

    pub fn size(&self) -> Option<i64> {
        self.dict.get("Size").and_then(|o| o.as_int().ok())
    }

    pub fn prev(&self) -> Option<u64> {
        self.dict
            .get("Prev")
            .and_then(|o| o.as_int().ok())
            .and_then(|n| u64::try_from(n).ok())
    }

    pub fn xref_stm(&self) -> Option<u64> {
        self.dict
            .get("XRefStm")
            .and_then(|o| o.as_int().ok())
            .and_then(|n| u64::try_from(n).ok())
    }

    pub fn root(&self) -> Option<Reference> {
        self.dict.get("Root").and_then(|o| o.as_reference().ok())
    }

    pub fn info(&self) -> Option<Reference> {
        self.dict.get("Info").and_then(|o| o.as_reference().ok())
    }

    pub fn encrypt(&self) -> Option<&Object> {
        self.dict.get("Encrypt")
    }

    pub fn id(&self) -> Option<&Vec<Object>> {
        self.dict.get("ID").and_then(|o| o.as_array().ok())
    }
}
