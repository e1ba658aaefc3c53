//! Pushback reader feeding the tokenizer.

use smallvec::SmallVec;
use std::io::{self, SeekFrom};

use super::source::ByteSource;

/// Byte reader with a small bounded pushback stack.
///
/// The tokenizer frequently has to hand a byte back (the delimiter that
/// terminated a bare token, the `<` that turned out to start a hex
/// string). Pushed-back bytes are LIFO and the logical position accounts
/// for them, so stream windows computed from `position()` stay exact.
pub struct SourceReader<'a> {
    cur: &'a mut dyn ByteSource,
    pushback: SmallVec<[u8; 8]>,
}

impl<'a> SourceReader<'a> {
    pub fn new(cur: &'a mut dyn ByteSource) -> Self {
        Self {
            cur,
            pushback: SmallVec::new(),
        }
    }

    /// Logical offset of the next byte [`next_u8`](Self::next_u8) will
    /// return.
    pub fn position(&self) -> u64 {
        self.cur.position() - self.pushback.len() as u64
    }

    pub fn is_seekable(&self) -> bool {
        self.cur.is_seekable()
    }

    pub fn source_len(&self) -> Option<u64> {
        self.cur.len()
    }

    /// Next byte, or `None` at end of input.
    pub fn next_u8(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.cur.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    pub fn peek_u8(&mut self) -> io::Result<Option<u8>> {
        match self.next_u8()? {
            Some(b) => {
                self.unread(b);
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    /// Hand a byte back; the next read returns it first.
    pub fn unread(&mut self, b: u8) {
        debug_assert!(self.pushback.len() < 8, "pushback overflow");
        self.pushback.push(b);
    }

    /// Jump to an absolute offset, dropping any pushed-back bytes.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.pushback.clear();
        self.cur.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Fill `buf` starting at the logical position.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(b) = self.pushback.pop() {
                buf[filled] = b;
                filled += 1;
                continue;
            }
            let n = self.cur.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read",
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Scan forward for `needle` and stop with the logical position at
    /// the start of the match. Returns the match offset, or `None` at
    /// end of input (position is then at EOF).
    ///
    /// Only usable on seekable sources (the cursor must step back over
    /// the matched bytes).
    pub fn find_forward(&mut self, needle: &[u8]) -> io::Result<Option<u64>> {
        debug_assert!(!needle.is_empty());
        let mut window: SmallVec<[u8; 16]> = SmallVec::new();
        while let Some(b) = self.next_u8()? {
            if window.len() == needle.len() {
                window.remove(0);
            }
            window.push(b);
            if window.as_slice() == needle {
                let start = self.position() - needle.len() as u64;
                self.seek_to(start)?;
                return Ok(Some(start));
            }
        }
        Ok(None)
    }

    /// Collect bytes up to (not including) `needle`, consuming the
    /// match. For forward-only sources a missing sentinel drains the
    /// remaining input into the result.
    pub fn read_until(&mut self, needle: &[u8]) -> io::Result<(Vec<u8>, bool)> {
        debug_assert!(!needle.is_empty());
        let mut out = Vec::new();
        while let Some(b) = self.next_u8()? {
            out.push(b);
            if out.len() >= needle.len() && out[out.len() - needle.len()..] == *needle {
                out.truncate(out.len() - needle.len());
                return Ok((out, true));
            }
        }
        Ok((out, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::MemorySource;
    use bytes::Bytes;

    #[test]
    fn test_unread_is_lifo_and_position_tracks() {
        let mut src = MemorySource::new(Bytes::from_static(b"abc"));
        let mut r = SourceReader::new(&mut src);
        assert_eq!(r.next_u8().unwrap(), Some(b'a'));
        assert_eq!(r.position(), 1);
        r.unread(b'a');
        assert_eq!(r.position(), 0);
        assert_eq!(r.peek_u8().unwrap(), Some(b'a'));
        assert_eq!(r.next_u8().unwrap(), Some(b'a'));
        assert_eq!(r.next_u8().unwrap(), Some(b'b'));
        assert_eq!(r.next_u8().unwrap(), Some(b'c'));
        assert_eq!(r.next_u8().unwrap(), None);
    }

    #[test]
    fn test_find_forward_lands_on_match() {
        let mut src = MemorySource::new(Bytes::from_static(b"xx endstream yy"));
        let mut r = SourceReader::new(&mut src);
        let off = r.find_forward(b"endstream").unwrap();
        assert_eq!(off, Some(3));
        assert_eq!(r.position(), 3);
        let mut buf = [0u8; 9];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"endstream");
    }

    #[test]
    fn test_find_forward_overlapping_prefix() {
        // "endstr" + a fresh "endstream": the rolling window must not
        // lose the restart.
        let mut src = MemorySource::new(Bytes::from_static(b"endstrendstream"));
        let mut r = SourceReader::new(&mut src);
        assert_eq!(r.find_forward(b"endstream").unwrap(), Some(6));
    }

    #[test]
    fn test_read_until_consumes_sentinel() {
        let mut src = MemorySource::new(Bytes::from_static(b"payloadENDrest"));
        let mut r = SourceReader::new(&mut src);
        let (data, found) = r.read_until(b"END").unwrap();
        assert!(found);
        assert_eq!(data, b"payload");
        assert_eq!(r.next_u8().unwrap(), Some(b'r'));
    }

    #[test]
    fn test_read_until_missing_sentinel_drains() {
        let mut src = MemorySource::new(Bytes::from_static(b"no marker here"));
        let mut r = SourceReader::new(&mut src);
        let (data, found) = r.read_until(b"END").unwrap();
        assert!(!found);
        assert_eq!(data, b"no marker here");
    }
}
