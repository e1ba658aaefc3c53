//! Byte-level PDF tokenizer.

use smol_str::SmolStr;

use crate::error::{Error, Result};
use crate::io::{ByteSource, SourceReader};
use crate::model::Name;

/// Check if byte is PDF whitespace.
pub(crate) const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

/// Check if byte is a PDF delimiter.
pub(crate) const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Check if byte ends a bare token.
pub(crate) const fn is_token_end(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

/// Bare keyword tokens. Structural keywords get zero-allocation
/// variants; anything else is carried verbatim for the parser to
/// classify (misspelled `endobj` variants included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Obj,
    EndObj,
    R,
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,
    True,
    False,
    Null,
    /// Free-entry marker in classic xref rows
    F,
    /// In-use marker in classic xref rows
    N,
    Other(SmolStr),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"obj" => Keyword::Obj,
            b"endobj" => Keyword::EndObj,
            b"R" => Keyword::R,
            b"stream" => Keyword::Stream,
            b"endstream" => Keyword::EndStream,
            b"xref" => Keyword::Xref,
            b"trailer" => Keyword::Trailer,
            b"startxref" => Keyword::StartXref,
            b"true" => Keyword::True,
            b"false" => Keyword::False,
            b"null" => Keyword::Null,
            b"f" => Keyword::F,
            b"n" => Keyword::N,
            _ => Keyword::Other(SmolStr::new(String::from_utf8_lossy(b))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Keyword::Obj => "obj",
            Keyword::EndObj => "endobj",
            Keyword::R => "R",
            Keyword::Stream => "stream",
            Keyword::EndStream => "endstream",
            Keyword::Xref => "xref",
            Keyword::Trailer => "trailer",
            Keyword::StartXref => "startxref",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::F => "f",
            Keyword::N => "n",
            Keyword::Other(s) => s.as_str(),
        }
    }
}

/// Tokens produced by [`Lexer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    ArrayOpen,
    ArrayClose,
    DictOpen,
    DictClose,
    /// Integer value
    Integer(i64),
    /// Floating point value
    Real(f64),
    /// Name (e.g. /Type)
    Name(Name),
    /// String written in `(...)` form, escapes resolved
    LiteralString(Vec<u8>),
    /// String written in `<...>` form, nibbles decoded
    HexString(Vec<u8>),
    /// Bare keyword
    Keyword(Keyword),
    /// `%` comment, bytes up to (not including) the line end
    Comment(Vec<u8>),
}

/// Streaming tokenizer over a pushback reader.
///
/// Bare tokens (numbers, names, keywords) un-read their terminating
/// byte: a CR or LF that ends a `stream` keyword must still be visible
/// to the payload capture that follows.
pub struct Lexer<'a> {
    reader: SourceReader<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(cur: &'a mut dyn ByteSource) -> Self {
        Self {
            reader: SourceReader::new(cur),
        }
    }

    pub fn from_reader(reader: SourceReader<'a>) -> Self {
        Self { reader }
    }

    /// Logical offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Direct access to the underlying reader (stream payload capture,
    /// sentinel scans).
    pub fn reader(&mut self) -> &mut SourceReader<'a> {
        &mut self.reader
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let Some(b) = self.reader.next_u8()? else {
                return Ok(None);
            };
            if is_whitespace(b) {
                continue;
            }
            let token = match b {
                b'%' => self.read_comment()?,
                b'/' => self.read_name()?,
                b'(' => self.read_literal_string()?,
                b'<' => match self.reader.peek_u8()? {
                    Some(b'<') => {
                        self.reader.next_u8()?;
                        Token::DictOpen
                    }
                    _ => self.read_hex_string()?,
                },
                b'>' => match self.reader.peek_u8()? {
                    Some(b'>') => {
                        self.reader.next_u8()?;
                        Token::DictClose
                    }
                    _ => {
                        tracing::warn!(pos = self.position(), "stray '>' skipped");
                        continue;
                    }
                },
                b'[' => Token::ArrayOpen,
                b']' => Token::ArrayClose,
                b')' | b'{' | b'}' => {
                    tracing::warn!(pos = self.position(), byte = b, "stray delimiter skipped");
                    continue;
                }
                b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number(b)?,
                _ => self.read_keyword(b)?,
            };
            return Ok(Some(token));
        }
    }

    /// Comment: bytes after `%` up to the line end. The EOL byte is
    /// consumed; EOF before a line end yields the partial comment.
    fn read_comment(&mut self) -> Result<Token> {
        let mut text = Vec::new();
        while let Some(b) = self.reader.next_u8()? {
            if b == b'\r' || b == b'\n' {
                break;
            }
            text.push(b);
        }
        Ok(Token::Comment(text))
    }

    /// Name after `/`, with `#xx` hex escapes decoded. An invalid
    /// escape drops the `#` and keeps the following characters.
    fn read_name(&mut self) -> Result<Token> {
        let mut bytes = Vec::new();
        while let Some(b) = self.reader.next_u8()? {
            if is_token_end(b) {
                self.reader.unread(b);
                break;
            }
            if b == b'#' {
                let h1 = self.reader.next_u8()?;
                match h1 {
                    Some(c1) if c1.is_ascii_hexdigit() => match self.reader.next_u8()? {
                        Some(c2) if c2.is_ascii_hexdigit() => {
                            bytes.push(hex_nibble(c1) << 4 | hex_nibble(c2));
                        }
                        Some(c2) => {
                            bytes.push(c1);
                            self.reader.unread(c2);
                        }
                        None => bytes.push(c1),
                    },
                    Some(c1) => self.reader.unread(c1),
                    None => break,
                }
            } else {
                bytes.push(b);
            }
        }
        Ok(Token::Name(Name::new(String::from_utf8_lossy(&bytes))))
    }

    /// Number starting with `first`. Tolerant of malformed input:
    /// doubled signs collapse (negative if any `-` leads), trailing
    /// garbage inside the bare token truncates, a signless husk scans
    /// as zero.
    fn read_number(&mut self, first: u8) -> Result<Token> {
        let mut run: Vec<u8> = vec![first];
        while let Some(b) = self.reader.next_u8()? {
            if is_token_end(b) {
                self.reader.unread(b);
                break;
            }
            run.push(b);
        }

        let mut idx = 0;
        let mut negative = false;
        while idx < run.len() && (run[idx] == b'+' || run[idx] == b'-') {
            if run[idx] == b'-' && !negative {
                negative = true;
            }
            idx += 1;
        }

        let mut digits = String::new();
        let mut has_dot = false;
        let mut has_digit = false;
        for &b in &run[idx..] {
            match b {
                b'0'..=b'9' => {
                    has_digit = true;
                    digits.push(b as char);
                }
                b'.' if !has_dot => {
                    has_dot = true;
                    digits.push('.');
                }
                _ => break,
            }
        }

        if !has_digit {
            return Ok(Token::Integer(0));
        }
        if has_dot {
            let val: f64 = digits.parse().unwrap_or(0.0);
            Ok(Token::Real(if negative { -val } else { val }))
        } else {
            match digits.parse::<i64>() {
                Ok(val) => Ok(Token::Integer(if negative { -val } else { val })),
                // Overflowing integers degrade to reals
                Err(_) => {
                    let val: f64 = digits.parse().unwrap_or(0.0);
                    Ok(Token::Real(if negative { -val } else { val }))
                }
            }
        }
    }

    /// Literal string after `(`: balanced parens, escape sequences,
    /// line continuations. Unterminated input returns what was
    /// collected.
    fn read_literal_string(&mut self) -> Result<Token> {
        let mut result = Vec::new();
        let mut depth = 1u32;

        loop {
            let Some(b) = self.reader.next_u8()? else {
                tracing::warn!(pos = self.position(), "unterminated literal string");
                break;
            };
            match b {
                b'(' => {
                    depth += 1;
                    result.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(b')');
                }
                b'\\' => match self.reader.next_u8()? {
                    Some(b'n') => result.push(b'\n'),
                    Some(b'r') => result.push(b'\r'),
                    Some(b't') => result.push(b'\t'),
                    Some(b'b') => result.push(0x08),
                    Some(b'f') => result.push(0x0c),
                    Some(b'(') => result.push(b'('),
                    Some(b')') => result.push(b')'),
                    Some(b'\\') => result.push(b'\\'),
                    Some(b'\r') => {
                        // Line continuation, optional LF after CR
                        if self.reader.peek_u8()? == Some(b'\n') {
                            self.reader.next_u8()?;
                        }
                    }
                    Some(b'\n') => {}
                    Some(c) if c.is_ascii_digit() && c < b'8' => {
                        let mut octal = (c - b'0') as u32;
                        for _ in 0..2 {
                            match self.reader.peek_u8()? {
                                Some(d) if d.is_ascii_digit() && d < b'8' => {
                                    self.reader.next_u8()?;
                                    octal = octal * 8 + (d - b'0') as u32;
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    }
                    Some(c) => {
                        tracing::warn!(
                            pos = self.position(),
                            escape = c,
                            "unknown string escape, backslash dropped"
                        );
                        result.push(c);
                    }
                    None => {
                        tracing::warn!(pos = self.position(), "unterminated literal string");
                        break;
                    }
                },
                _ => result.push(b),
            }
        }

        Ok(Token::LiteralString(result))
    }

    /// Hex string after `<`: digits are case-insensitive, whitespace is
    /// ignored, other bytes are skipped, an odd trailing digit is
    /// padded with zero.
    fn read_hex_string(&mut self) -> Result<Token> {
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            let Some(b) = self.reader.next_u8()? else {
                tracing::warn!(pos = self.position(), "unterminated hex string");
                break;
            };
            match b {
                b'>' => break,
                c if c.is_ascii_hexdigit() => {
                    let nibble = hex_nibble(c);
                    match pending.take() {
                        Some(high) => result.push((high << 4) | nibble),
                        None => pending = Some(nibble),
                    }
                }
                c if is_whitespace(c) => {}
                c => {
                    tracing::warn!(pos = self.position(), byte = c, "non-hex byte in hex string skipped");
                }
            }
        }

        if let Some(high) = pending {
            result.push(high << 4);
        }
        Ok(Token::HexString(result))
    }

    /// Bare keyword starting with `first`. The terminator is un-read.
    fn read_keyword(&mut self, first: u8) -> Result<Token> {
        let mut bytes = vec![first];
        while let Some(b) = self.reader.next_u8()? {
            if is_token_end(b) {
                self.reader.unread(b);
                break;
            }
            bytes.push(b);
        }
        Ok(Token::Keyword(Keyword::from_bytes(&bytes)))
    }

    /// Consume the end-of-line after a `stream` keyword. CRLF is the
    /// written form; lone LF, lone CR, and a stray CR before other
    /// bytes all occur in the wild and are tolerated.
    pub fn skip_stream_eol(&mut self) -> Result<()> {
        match self.reader.next_u8()? {
            Some(b'\r') => {
                match self.reader.peek_u8()? {
                    Some(b'\n') => {
                        self.reader.next_u8()?;
                    }
                    _ => {
                        tracing::warn!(pos = self.position(), "CR without LF after stream keyword");
                    }
                }
                Ok(())
            }
            Some(b'\n') => Ok(()),
            Some(other) => {
                tracing::warn!(
                    pos = self.position(),
                    byte = other,
                    "missing EOL after stream keyword"
                );
                self.reader.unread(other);
                Ok(())
            }
            None => Err(Error::UnexpectedEof),
        }
    }
}

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}
