//! Push-down object parser.
//!
//! Tokens accumulate on a tagged stack; `[`/`<<` push marks, `]`/`>>`
//! collapse everything above the nearest mark into an array or
//! dictionary. Indirect object framing (`obj`/`endobj`), stream payload
//! capture, and classic cross-reference tables are handled between
//! value transitions. The parser is deliberately forgiving: malformed
//! framing degrades to warnings and Null objects, never to a poisoned
//! parse.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;

use super::lexer::{Keyword, Lexer, Token};
use crate::codec;
use crate::document::xref::{Trailer, XrefSection};
use crate::error::{Error, Result};
use crate::io::ByteSource;
use crate::model::{
    Dictionary, Object, ObjectKind, PdfString, Reference, Stream, StreamData, StreamKind,
};

/// A parsed indirect object.
#[derive(Debug, Clone, PartialEq)]
pub struct Indirect {
    pub reference: Reference,
    pub object: Object,
    pub kind: ObjectKind,
}

/// What a call to [`ObjectParser::next_object`] produced.
#[derive(Debug)]
pub enum Outcome {
    /// A complete indirect object.
    Object(Indirect),
    /// A trailer: classic `trailer` dictionary or a cross-reference
    /// stream reinterpreted as one (its table already ingested).
    Trailer(Trailer),
    /// End of input.
    Eof,
}

#[derive(Debug)]
enum StackEntry {
    Value(Object),
    ArrayMark,
    DictMark,
}

fn entry_value(entry: StackEntry) -> Option<Object> {
    match entry {
        StackEntry::Value(v) => Some(v),
        _ => None,
    }
}

/// `endobj` and the misspellings producers emit for it: any prefix of
/// at least four bytes (`endo`, `endob`) or any keyword extending it
/// (`endobject`).
fn is_endobj_variant(s: &str) -> bool {
    s.len() >= 4 && ("endobj".starts_with(s) || s.starts_with("endobj"))
}

fn is_endobj_keyword(kw: &Keyword) -> bool {
    match kw {
        Keyword::EndObj => true,
        Keyword::Other(s) => is_endobj_variant(s),
        _ => false,
    }
}

/// Trailing end-of-line bytes to trim from a sentinel-scanned payload.
fn eol_suffix(tail: &[u8]) -> usize {
    if tail.ends_with(b"\r\n") {
        2
    } else if tail.ends_with(b"\n") || tail.ends_with(b"\r") {
        1
    } else {
        0
    }
}

pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    /// Pushed-back tokens, drained before the lexer. Invalidated by
    /// seeks.
    queue: VecDeque<Token>,
    stack: Vec<StackEntry>,
    /// Reference of the open indirect object; stamped onto strings as
    /// their owner.
    current: Option<Reference>,
    /// Set by the `trailer` keyword; the next completed dictionary is
    /// emitted through the trailer channel.
    trailer_mode: bool,
    /// Classic table section held until its trailer dictionary closes.
    pending_xref: Option<XrefSection>,
    trailer_offset: u64,
    object_offset: u64,
}

impl<'a> ObjectParser<'a> {
    pub fn new(src: &'a mut dyn ByteSource) -> Self {
        Self {
            lexer: Lexer::new(src),
            queue: VecDeque::new(),
            stack: Vec::new(),
            current: None,
            trailer_mode: false,
            pending_xref: None,
            trailer_offset: 0,
            object_offset: 0,
        }
    }

    pub fn at_offset(src: &'a mut dyn ByteSource, offset: u64) -> Result<Self> {
        let mut parser = Self::new(src);
        parser.seek_to(offset)?;
        Ok(parser)
    }

    pub fn position(&self) -> u64 {
        self.lexer.position()
    }

    /// Jump to an absolute offset, dropping any token lookahead.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.queue.clear();
        self.lexer.reader().seek_to(offset)?;
        Ok(())
    }

    /// Owner reference stamped onto strings parsed from here on, for
    /// callers parsing a fragment on behalf of an indirect object.
    pub fn set_owner(&mut self, owner: Option<Reference>) {
        self.current = owner;
    }

    /// Parse forward to the next indirect object or trailer.
    pub fn next_object(&mut self) -> Result<Outcome> {
        loop {
            let Some(token) = self.next_token()? else {
                return self.finish();
            };
            if let Some(outcome) = self.step(token)? {
                return Ok(outcome);
            }
        }
    }

    /// Parse one bare value (no `obj`/`endobj` framing). `num gen R`
    /// is recognized with two tokens of lookahead since compressed
    /// object streams lay values out back to back with no delimiters.
    pub fn next_value(&mut self) -> Result<Object> {
        let base = self.stack.len();
        loop {
            let Some(token) = self.next_token()? else {
                if self.stack.len() > base {
                    tracing::warn!(pos = self.position(), "input ended inside compound value");
                    return Ok(self.force_close(base));
                }
                return Err(Error::UnexpectedEof);
            };

            if self.stack.len() == base {
                match token {
                    Token::Comment(_) => continue,
                    Token::Integer(n) => {
                        if let Some(obj) = self.try_reference(n)? {
                            return Ok(obj);
                        }
                        return Ok(Object::Integer(n));
                    }
                    Token::Real(x) => return Ok(Object::Real(x)),
                    Token::Name(n) => return Ok(Object::Name(n)),
                    Token::LiteralString(d) => {
                        return Ok(Object::String(PdfString::literal(d, self.current)));
                    }
                    Token::HexString(d) => {
                        return Ok(Object::String(PdfString::hex(d, self.current)));
                    }
                    Token::Keyword(Keyword::True) => return Ok(Object::Bool(true)),
                    Token::Keyword(Keyword::False) => return Ok(Object::Bool(false)),
                    Token::Keyword(Keyword::Null) => return Ok(Object::Null),
                    Token::Keyword(Keyword::R) => {
                        tracing::warn!(pos = self.position(), "R keyword without operands skipped");
                        continue;
                    }
                    Token::Keyword(kw) => {
                        tracing::debug!(
                            keyword = kw.as_str(),
                            "keyword in value context treated as null"
                        );
                        return Ok(Object::Null);
                    }
                    other => {
                        self.apply_value_token(other)?;
                    }
                }
            } else {
                self.apply_value_token(token)?;
            }

            if self.stack.len() == base + 1
                && matches!(self.stack.last(), Some(StackEntry::Value(_)))
                && let Some(v) = self.pop_value()
            {
                return Ok(v);
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(t) = self.queue.pop_front() {
            return Ok(Some(t));
        }
        self.lexer.next_token()
    }

    fn unread_token(&mut self, token: Token) {
        self.queue.push_front(token);
    }

    fn step(&mut self, token: Token) -> Result<Option<Outcome>> {
        match token {
            Token::Keyword(Keyword::Obj) => Ok(self.handle_obj()),
            Token::Keyword(Keyword::EndObj) => Ok(self.handle_endobj()),
            Token::Keyword(Keyword::Other(ref s)) if is_endobj_variant(s) => {
                tracing::warn!(keyword = %s, "malformed endobj keyword accepted");
                Ok(self.handle_endobj())
            }
            Token::Keyword(Keyword::Stream) => self.begin_stream(),
            Token::Keyword(Keyword::EndStream) => {
                tracing::debug!(pos = self.position(), "stray endstream skipped");
                Ok(None)
            }
            Token::Keyword(Keyword::Xref) => {
                self.parse_classic_section()?;
                Ok(None)
            }
            Token::Keyword(Keyword::Trailer) => {
                self.trailer_mode = true;
                if self.pending_xref.is_none() {
                    self.trailer_offset = self.position();
                }
                Ok(None)
            }
            Token::Keyword(Keyword::StartXref) => {
                // The offset operand belongs to document bootstrap, not
                // the object stream
                match self.next_token()? {
                    Some(Token::Integer(_)) | None => {}
                    Some(other) => self.unread_token(other),
                }
                Ok(None)
            }
            other => self.apply_value_token(other),
        }
    }

    /// Value-level transitions shared by object and bare-value parsing.
    fn apply_value_token(&mut self, token: Token) -> Result<Option<Outcome>> {
        match token {
            Token::Comment(_) => {}
            Token::Integer(n) => self.stack.push(StackEntry::Value(Object::Integer(n))),
            Token::Real(x) => self.stack.push(StackEntry::Value(Object::Real(x))),
            Token::Name(n) => self.stack.push(StackEntry::Value(Object::Name(n))),
            Token::LiteralString(d) => self
                .stack
                .push(StackEntry::Value(Object::String(PdfString::literal(
                    d,
                    self.current,
                )))),
            Token::HexString(d) => self
                .stack
                .push(StackEntry::Value(Object::String(PdfString::hex(
                    d,
                    self.current,
                )))),
            Token::ArrayOpen => self.stack.push(StackEntry::ArrayMark),
            Token::ArrayClose => self.close_array(),
            Token::DictOpen => self.stack.push(StackEntry::DictMark),
            Token::DictClose => return Ok(self.close_dict()),
            Token::Keyword(Keyword::R) => self.apply_reference(),
            Token::Keyword(Keyword::True) => self.stack.push(StackEntry::Value(Object::Bool(true))),
            Token::Keyword(Keyword::False) => {
                self.stack.push(StackEntry::Value(Object::Bool(false)));
            }
            Token::Keyword(Keyword::Null) => self.stack.push(StackEntry::Value(Object::Null)),
            Token::Keyword(kw) => {
                tracing::debug!(keyword = kw.as_str(), "unknown keyword treated as null");
                self.stack.push(StackEntry::Value(Object::Null));
            }
        }
        Ok(None)
    }

    fn pop_value(&mut self) -> Option<Object> {
        if matches!(self.stack.last(), Some(StackEntry::Value(_)))
            && let Some(StackEntry::Value(v)) = self.stack.pop()
        {
            return Some(v);
        }
        None
    }

    /// Pop `num gen` operands if the two topmost entries are integers.
    fn pop_number_pair(&mut self) -> Option<(i64, i64)> {
        let n = self.stack.len();
        if n < 2 {
            return None;
        }
        match (&self.stack[n - 2], &self.stack[n - 1]) {
            (
                StackEntry::Value(Object::Integer(num)),
                StackEntry::Value(Object::Integer(r#gen)),
            ) => {
                let (num, r#gen) = (*num, *r#gen);
                self.stack.truncate(n - 2);
                Some((num, r#gen))
            }
            _ => None,
        }
    }

    fn apply_reference(&mut self) {
        match self.pop_number_pair() {
            Some((num, r#gen)) => match (u32::try_from(num), u16::try_from(r#gen)) {
                (Ok(n), Ok(g)) => self
                    .stack
                    .push(StackEntry::Value(Object::Reference(Reference::new(n, g)))),
                _ => tracing::warn!(num, gen = r#gen, "reference operands out of range"),
            },
            None => {
                tracing::warn!(pos = self.position(), "R keyword without numeric operands");
            }
        }
    }

    /// Innermost mark: index and whether it is an array mark.
    fn innermost_mark(&self) -> Option<(usize, bool)> {
        self.stack
            .iter()
            .rposition(|e| !matches!(e, StackEntry::Value(_)))
            .map(|i| (i, matches!(self.stack[i], StackEntry::ArrayMark)))
    }

    fn close_array(&mut self) {
        match self.innermost_mark() {
            Some((idx, true)) => {
                let items: Vec<Object> = self
                    .stack
                    .split_off(idx + 1)
                    .into_iter()
                    .filter_map(entry_value)
                    .collect();
                self.stack.pop();
                self.stack.push(StackEntry::Value(Object::Array(items)));
            }
            _ => {
                tracing::warn!(pos = self.position(), "']' without open array");
                self.stack.push(StackEntry::Value(Object::Array(Vec::new())));
            }
        }
    }

    fn close_dict(&mut self) -> Option<Outcome> {
        let Some((idx, false)) = self.innermost_mark() else {
            tracing::warn!(pos = self.position(), "'>>' without open dictionary ignored");
            return None;
        };
        let mut values: Vec<Object> = self
            .stack
            .split_off(idx + 1)
            .into_iter()
            .filter_map(entry_value)
            .collect();
        self.stack.pop();

        if values.len() % 2 != 0 {
            tracing::warn!(pos = self.position(), "dictionary with dangling value dropped");
            values.pop();
        }
        let mut dict = Dictionary::new();
        let mut it = values.into_iter();
        while let (Some(key), Some(value)) = (it.next(), it.next()) {
            match key {
                Object::Name(name) => {
                    dict.insert(name, value);
                }
                other => {
                    tracing::warn!(key_type = other.type_name(), "non-name dictionary key dropped");
                }
            }
        }

        if self.trailer_mode {
            self.trailer_mode = false;
            let xref = self.pending_xref.take();
            return Some(Outcome::Trailer(Trailer::new(dict, xref, self.trailer_offset)));
        }
        self.stack.push(StackEntry::Value(Object::Dict(dict)));
        None
    }

    fn handle_obj(&mut self) -> Option<Outcome> {
        let Some((num, r#gen)) = self.pop_number_pair() else {
            tracing::warn!(pos = self.position(), "obj keyword without header numbers");
            return None;
        };
        let reference = match (u32::try_from(num), u16::try_from(r#gen)) {
            (Ok(n), Ok(g)) => Reference::new(n, g),
            _ => {
                tracing::warn!(num, gen = r#gen, "object header numbers out of range");
                return None;
            }
        };
        self.object_offset = self.position();
        match self.current.replace(reference) {
            Some(prior) => {
                tracing::warn!(previous = %prior, "object header before previous endobj");
                Some(self.emit_with(prior))
            }
            None => None,
        }
    }

    fn handle_endobj(&mut self) -> Option<Outcome> {
        match self.current.take() {
            Some(reference) => Some(self.emit_with(reference)),
            None => {
                tracing::debug!(pos = self.position(), "stray endobj skipped");
                None
            }
        }
    }

    fn emit_with(&mut self, reference: Reference) -> Outcome {
        let object = self.pop_value().unwrap_or(Object::Null);
        self.emit_object(reference, object)
    }

    fn emit_object(&mut self, reference: Reference, object: Object) -> Outcome {
        if !self.stack.is_empty() {
            tracing::warn!(
                %reference,
                depth = self.stack.len(),
                "discarding unfinished values at object end"
            );
            self.stack.clear();
        }
        let kind = match &object {
            Object::Dict(d) => ObjectKind::classify(d),
            Object::Stream(s) => ObjectKind::classify(&s.dict),
            _ => ObjectKind::Other,
        };
        Outcome::Object(Indirect {
            reference,
            object,
            kind,
        })
    }

    /// Capture a stream payload after the `stream` keyword. The
    /// dictionary is the value on top of the stack.
    ///
    /// Seekable sources record a window and never copy the payload; a
    /// direct positive `/Length` is trusted only if `endstream` in fact
    /// follows the span, otherwise (and for indirect or missing
    /// lengths) a forward sentinel scan decides. `/Length` is never
    /// resolved through the resolver: resolution from inside a parse
    /// would re-enter the source lock.
    fn begin_stream(&mut self) -> Result<Option<Outcome>> {
        debug_assert!(self.queue.is_empty(), "token lookahead across stream capture");
        let dict = match self.stack.pop() {
            Some(StackEntry::Value(Object::Dict(d))) => d,
            Some(other) => {
                tracing::warn!(pos = self.position(), "stream keyword without dictionary");
                self.stack.push(other);
                return Ok(None);
            }
            None => {
                tracing::warn!(pos = self.position(), "stream keyword without dictionary");
                return Ok(None);
            }
        };
        self.lexer.skip_stream_eol()?;
        let start = self.lexer.position();

        let declared = match dict.get("Length") {
            Some(Object::Integer(n)) if *n > 0 => Some(*n as u64),
            Some(Object::Integer(n)) => {
                tracing::warn!(length = n, "non-positive stream Length, scanning for endstream");
                None
            }
            Some(other) => {
                tracing::debug!(
                    length_type = other.type_name(),
                    "indirect stream Length, scanning for endstream"
                );
                None
            }
            None => {
                tracing::warn!(pos = start, "stream without Length, scanning for endstream");
                None
            }
        };

        let data = if !self.lexer.reader().is_seekable() {
            // Forward-only: the payload has to be buffered, and the
            // sentinel is the only reliable terminator
            let (mut payload, found) = self.lexer.reader().read_until(b"endstream")?;
            if found {
                let trim = eol_suffix(&payload);
                payload.truncate(payload.len() - trim);
            } else {
                tracing::warn!(start, "no endstream sentinel, buffered to end of input");
            }
            StreamData::Buffered(Bytes::from(payload))
        } else {
            match declared {
                Some(len)
                    if self
                        .lexer
                        .reader()
                        .source_len()
                        .is_none_or(|total| start + len <= total) =>
                {
                    self.lexer.reader().seek_to(start + len)?;
                    if self.consume_endstream()? {
                        StreamData::Window {
                            offset: start,
                            length: len,
                        }
                    } else {
                        tracing::warn!(
                            declared = len,
                            "stream Length not followed by endstream, rescanning"
                        );
                        self.queue.clear();
                        self.lexer.reader().seek_to(start)?;
                        self.scan_stream_window(start)?
                    }
                }
                Some(len) => {
                    tracing::warn!(declared = len, "stream Length exceeds source, rescanning");
                    self.scan_stream_window(start)?
                }
                None => self.scan_stream_window(start)?,
            }
        };

        let kind = StreamKind::classify(&dict);
        if kind == StreamKind::XRef {
            return Ok(Some(self.finish_xref_stream(dict, data)?));
        }

        let stream = Object::Stream(Arc::new(Stream::new(dict, data, kind)));
        self.consume_endobj()?;
        match self.current.take() {
            // Close the enclosing object right away: endstream/endobj
            // are consumed above when present, not required
            Some(reference) => Ok(Some(self.emit_object(reference, stream))),
            None => {
                tracing::warn!(pos = self.position(), "stream outside indirect object");
                self.stack.push(StackEntry::Value(stream));
                Ok(None)
            }
        }
    }

    /// Forward scan for the `endstream` sentinel; the window excludes
    /// one trailing end-of-line and the cursor ends up past the
    /// sentinel.
    fn scan_stream_window(&mut self, start: u64) -> Result<StreamData> {
        match self.lexer.reader().find_forward(b"endstream")? {
            Some(end) => {
                let span = end - start;
                let tail_len = span.min(2) as usize;
                let mut tail = [0u8; 2];
                self.lexer.reader().seek_to(end - tail_len as u64)?;
                self.lexer.reader().read_exact(&mut tail[..tail_len])?;
                let length = span - eol_suffix(&tail[..tail_len]) as u64;
                self.lexer.reader().seek_to(end + b"endstream".len() as u64)?;
                Ok(StreamData::Window {
                    offset: start,
                    length,
                })
            }
            None => {
                tracing::warn!(start, "no endstream sentinel, stream captured to end of input");
                let end = self.lexer.reader().source_len().unwrap_or(start);
                Ok(StreamData::Window {
                    offset: start,
                    length: end.saturating_sub(start),
                })
            }
        }
    }

    /// Decode and ingest a `/Type /XRef` stream, reinterpreting its
    /// dictionary as a trailer (stream bookkeeping keys stripped).
    fn finish_xref_stream(&mut self, dict: Dictionary, data: StreamData) -> Result<Outcome> {
        let raw = self.read_stream_bytes(&data)?;
        let decoded = codec::decode(&dict, raw);
        let xref = match XrefSection::from_stream(&dict, &decoded) {
            Ok(section) => Some(section),
            Err(err) => {
                tracing::warn!(%err, "cross-reference stream ingestion failed");
                None
            }
        };
        let trailer_dict: Dictionary = dict
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    "Length" | "Filter" | "DecodeParms" | "DP" | "W" | "Index"
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.consume_endobj()?;
        self.current = None;
        self.stack.clear();
        Ok(Outcome::Trailer(Trailer::new(
            trailer_dict,
            xref,
            self.object_offset,
        )))
    }

    fn read_stream_bytes(&mut self, data: &StreamData) -> Result<Bytes> {
        match data {
            StreamData::Buffered(b) => Ok(b.clone()),
            StreamData::Window { offset, length } => {
                let restore = self.lexer.reader().position();
                let mut buf = vec![0u8; *length as usize];
                self.lexer.reader().seek_to(*offset)?;
                self.lexer.reader().read_exact(&mut buf)?;
                self.lexer.reader().seek_to(restore)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Consume the next token if it is `endstream`.
    fn consume_endstream(&mut self) -> Result<bool> {
        match self.next_token()? {
            Some(Token::Keyword(Keyword::EndStream)) => Ok(true),
            Some(other) => {
                self.unread_token(other);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Consume the next token if it closes the object.
    fn consume_endobj(&mut self) -> Result<()> {
        match self.next_token()? {
            Some(Token::Keyword(ref kw)) if is_endobj_keyword(kw) => Ok(()),
            Some(other) => {
                self.unread_token(other);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Classic cross-reference table after the `xref` keyword:
    /// subsection headers `start count`, then `offset gen n|f` rows.
    /// The section is held until the trailer dictionary closes.
    fn parse_classic_section(&mut self) -> Result<()> {
        self.trailer_offset = self.position();
        let mut section = XrefSection::new();
        'subsections: loop {
            let start = match self.next_token()? {
                Some(Token::Integer(n)) if n >= 0 => n as u32,
                Some(other) => {
                    self.unread_token(other);
                    break;
                }
                None => break,
            };
            let count = match self.next_token()? {
                Some(Token::Integer(n)) if n >= 0 => n as usize,
                Some(other) => {
                    tracing::warn!(start, "xref subsection header missing count");
                    self.unread_token(other);
                    break;
                }
                None => break,
            };

            let mut base = start;
            for i in 0..count {
                let offset = match self.next_token()? {
                    Some(Token::Integer(n)) => n,
                    Some(other) => {
                        tracing::warn!(pos = self.position(), "malformed xref row");
                        self.unread_token(other);
                        break 'subsections;
                    }
                    None => break 'subsections,
                };
                let r#gen = match self.next_token()? {
                    Some(Token::Integer(n)) => n,
                    Some(other) => {
                        tracing::warn!(pos = self.position(), "malformed xref row");
                        self.unread_token(other);
                        break 'subsections;
                    }
                    None => break 'subsections,
                };
                let free = match self.next_token()? {
                    Some(Token::Keyword(Keyword::N)) => false,
                    Some(Token::Keyword(Keyword::F)) => true,
                    Some(other) => {
                        tracing::warn!(pos = self.position(), "malformed xref row marker");
                        self.unread_token(other);
                        break 'subsections;
                    }
                    None => break 'subsections,
                };

                // Off-by-one headers are common: a subsection claiming
                // to start past zero but opening with the object-0 free
                // row actually starts at zero
                if i == 0 && base > 0 && offset == 0 && r#gen == 65535 && free {
                    tracing::debug!(claimed = base, "xref subsection base adjusted to zero");
                    base = 0;
                }
                let Some(num) = base.checked_add(i as u32) else {
                    tracing::warn!(base, i, "xref object number overflow");
                    break 'subsections;
                };
                if free {
                    section.insert_free(num);
                } else if offset >= 0 {
                    section.insert_used(num, offset as u64, r#gen.clamp(0, 65535) as u16);
                } else {
                    tracing::warn!(num, offset, "negative xref offset skipped");
                }
            }
        }
        if section.is_empty() {
            tracing::warn!(offset = self.trailer_offset, "empty classic xref section");
        }
        self.pending_xref = Some(section);
        Ok(())
    }

    /// Two-token lookahead for `num gen R` starting from a bare
    /// integer.
    fn try_reference(&mut self, num: i64) -> Result<Option<Object>> {
        let Some(second) = self.next_token()? else {
            return Ok(None);
        };
        let Token::Integer(r#gen) = second else {
            self.unread_token(second);
            return Ok(None);
        };
        let Some(third) = self.next_token()? else {
            self.unread_token(Token::Integer(r#gen));
            return Ok(None);
        };
        if matches!(third, Token::Keyword(Keyword::R)) {
            return match (u32::try_from(num), u16::try_from(r#gen)) {
                (Ok(n), Ok(g)) => Ok(Some(Object::Reference(Reference::new(n, g)))),
                _ => {
                    tracing::warn!(num, gen = r#gen, "reference operands out of range");
                    Ok(Some(Object::Null))
                }
            };
        }
        self.unread_token(third);
        self.unread_token(Token::Integer(r#gen));
        Ok(None)
    }

    /// Collapse any open compounds above `base` and return the value.
    fn force_close(&mut self, base: usize) -> Object {
        loop {
            match self.innermost_mark() {
                Some((idx, true)) if idx >= base => self.close_array(),
                Some((idx, false)) if idx >= base => {
                    self.close_dict();
                }
                _ => break,
            }
        }
        let mut result = Object::Null;
        while self.stack.len() > base {
            if let Some(v) = self.pop_value() {
                result = v;
            } else {
                self.stack.pop();
            }
        }
        result
    }

    /// Input exhausted: flush an open object or a table still waiting
    /// for its trailer dictionary, then report end of input.
    fn finish(&mut self) -> Result<Outcome> {
        if let Some(reference) = self.current.take() {
            tracing::warn!(%reference, "input ended inside object");
            return Ok(self.emit_with(reference));
        }
        if self.pending_xref.is_some() || self.trailer_mode {
            tracing::warn!("input ended before trailer dictionary");
            self.trailer_mode = false;
            let xref = self.pending_xref.take();
            return Ok(Outcome::Trailer(Trailer::new(
                Dictionary::new(),
                xref,
                self.trailer_offset,
            )));
        }
        Ok(Outcome::Eof)
    }
}
