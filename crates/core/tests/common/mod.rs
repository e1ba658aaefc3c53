//! Shared helpers for building synthetic PDF files with accurate byte
//! offsets, revision by revision.

// Each test crate pulls in the subset it needs
#![allow(dead_code)]

use std::fmt::Write as _;
use std::io::Write as _;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::ZlibEncoder;

/// One cross-reference row scheduled for the next table emission.
enum Row {
    Used { num: u32, r#gen: u16, offset: u64 },
    Compressed { num: u32, container: u32, index: u32 },
    Free { num: u32, r#gen: u16 },
}

impl Row {
    fn num(&self) -> u32 {
        match *self {
            Row::Used { num, .. } | Row::Compressed { num, .. } | Row::Free { num, .. } => num,
        }
    }
}

/// Builds a PDF file one revision at a time. Objects are appended and
/// their offsets recorded; `finish_classic` / `finish_xref_stream`
/// close the revision with a table, trailer and `startxref`.
pub struct PdfBuilder {
    buf: Vec<u8>,
    pending: Vec<Row>,
    prev_xref: Option<u64>,
    max_num: u32,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_header("1.5")
    }

    pub fn with_header(version: &str) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("%PDF-{version}\n").as_bytes());
        Self {
            buf,
            pending: Vec::new(),
            prev_xref: None,
            max_num: 0,
        }
    }

    /// Append an indirect object with a textual body. Returns its
    /// byte offset.
    pub fn add_object(&mut self, num: u32, body: &str) -> u64 {
        let offset = self.buf.len() as u64;
        self.record(Row::Used {
            num,
            r#gen: 0,
            offset,
        });
        self.buf
            .extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
        offset
    }

    /// Append a stream object. `dict` is the complete dictionary text
    /// including the angle brackets.
    pub fn add_stream(&mut self, num: u32, dict: &str, payload: &[u8]) -> u64 {
        let offset = self.buf.len() as u64;
        self.record(Row::Used {
            num,
            r#gen: 0,
            offset,
        });
        self.buf
            .extend_from_slice(format!("{num} 0 obj\n{dict}\nstream\n").as_bytes());
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        offset
    }

    /// Record a compressed-entry row without writing any bytes; the
    /// object itself lives in its container.
    pub fn add_compressed(&mut self, num: u32, container: u32, index: u32) {
        self.record(Row::Compressed {
            num,
            container,
            index,
        });
    }

    /// Record a free tombstone row.
    pub fn add_free(&mut self, num: u32, r#gen: u16) {
        self.record(Row::Free { num, r#gen });
    }

    fn record(&mut self, row: Row) {
        self.max_num = self.max_num.max(row.num());
        self.pending.push(row);
    }

    /// Close the revision with a classic `xref` table and trailer.
    /// `/Size` and (for updates) `/Prev` are filled in here; everything
    /// else goes through `trailer_entries`. Returns the table offset.
    pub fn finish_classic(&mut self, trailer_entries: &str) -> u64 {
        let xref_off = self.buf.len() as u64;
        let mut rows: Vec<(u32, String)> = Vec::new();
        if self.prev_xref.is_none() {
            rows.push((0, "0000000000 65535 f \n".to_owned()));
        }
        for row in &self.pending {
            match *row {
                Row::Used { num, r#gen, offset } => {
                    rows.push((num, format!("{offset:010} {gen:05} n \n")));
                }
                Row::Free { num, r#gen } => {
                    rows.push((num, format!("0000000000 {gen:05} f \n")));
                }
                Row::Compressed { num, .. } => {
                    panic!("classic xref table cannot hold compressed entry for object {num}");
                }
            }
        }
        rows.sort_by_key(|&(num, _)| num);

        let mut table = String::from("xref\n");
        let mut i = 0;
        while i < rows.len() {
            let start = rows[i].0;
            let mut end = i + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            let _ = writeln!(table, "{start} {}", end - i);
            for (_, row) in &rows[i..end] {
                table.push_str(row);
            }
            i = end;
        }
        self.buf.extend_from_slice(table.as_bytes());

        let mut trailer = format!("trailer\n<< /Size {} {trailer_entries}", self.max_num + 1);
        if let Some(prev) = self.prev_xref {
            let _ = write!(trailer, " /Prev {prev}");
        }
        trailer.push_str(" >>\n");
        self.buf.extend_from_slice(trailer.as_bytes());
        self.finish_startxref(xref_off);
        xref_off
    }

    /// Close the revision with a cross-reference stream (`/W [1 4 2]`,
    /// no filter). The stream object `num` gets its own row. Returns
    /// the stream offset.
    pub fn finish_xref_stream(&mut self, num: u32, trailer_entries: &str) -> u64 {
        let xref_off = self.buf.len() as u64;
        self.record(Row::Used {
            num,
            r#gen: 0,
            offset: xref_off,
        });

        let mut rows: Vec<(u32, [u8; 7])> = Vec::new();
        if self.prev_xref.is_none() {
            rows.push((0, pack_row(0, 0, 65535)));
        }
        for row in &self.pending {
            let packed = match *row {
                Row::Used { num, r#gen, offset } => (num, pack_row(1, offset, u64::from(r#gen))),
                Row::Compressed {
                    num,
                    container,
                    index,
                } => (num, pack_row(2, u64::from(container), u64::from(index))),
                Row::Free { num, r#gen } => (num, pack_row(0, 0, u64::from(r#gen))),
            };
            rows.push(packed);
        }
        rows.sort_by_key(|&(num, _)| num);

        let mut index = String::new();
        let mut payload = Vec::new();
        let mut i = 0;
        while i < rows.len() {
            let start = rows[i].0;
            let mut end = i + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            let _ = write!(index, "{start} {} ", end - i);
            for (_, row) in &rows[i..end] {
                payload.extend_from_slice(row);
            }
            i = end;
        }

        let mut dict = format!(
            "<< /Type /XRef /Size {} /W [1 4 2] /Index [{}] /Length {} {trailer_entries}",
            self.max_num + 1,
            index.trim_end(),
            payload.len(),
        );
        if let Some(prev) = self.prev_xref {
            let _ = write!(dict, " /Prev {prev}");
        }
        dict.push_str(" >>");

        self.buf
            .extend_from_slice(format!("{num} 0 obj\n{dict}\nstream\n").as_bytes());
        self.buf.extend_from_slice(&payload);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self.finish_startxref(xref_off);
        xref_off
    }

    fn finish_startxref(&mut self, xref_off: u64) {
        self.buf
            .extend_from_slice(format!("startxref\n{xref_off}\n%%EOF\n").as_bytes());
        self.pending.clear();
        self.prev_xref = Some(xref_off);
    }

    pub fn build(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

fn pack_row(kind: u8, field1: u64, field2: u64) -> [u8; 7] {
    let mut row = [0u8; 7];
    row[0] = kind;
    row[1..5].copy_from_slice(&(field1 as u32).to_be_bytes());
    row[5..7].copy_from_slice(&(field2 as u16).to_be_bytes());
    row
}

/// Zlib-compress a payload the way `/FlateDecode` expects.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Build an object-stream payload from `(number, body)` pairs.
/// Returns `(first, payload)` for the `/First` key and the stream
/// bytes.
pub fn objstm_payload(objects: &[(u32, &str)]) -> (usize, Vec<u8>) {
    let mut header = String::new();
    let mut bodies = String::new();
    for &(num, body) in objects {
        let _ = write!(header, "{num} {} ", bodies.len());
        bodies.push_str(body);
        bodies.push(' ');
    }
    let first = header.len();
    let mut payload = header.into_bytes();
    payload.extend_from_slice(bodies.as_bytes());
    (first, payload)
}
