//! Byte sources and the document-wide cursor lock.

use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Abstract positioned byte source.
///
/// One cursor per document: every seek-and-parse sequence runs inside a
/// single [`SharedSource::with_cursor`] bracket, so implementations do
/// not need interior synchronization.
pub trait ByteSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current cursor offset from the start of the source.
    fn position(&self) -> u64;

    /// Total length, when known.
    fn len(&self) -> Option<u64>;

    /// Whether the source supports backward seeks. Forward-only sources
    /// get buffered stream payloads instead of windows.
    fn is_seekable(&self) -> bool;

    /// Read up to `length` bytes at `offset`. Short data near EOF is
    /// returned truncated. The cursor position afterwards is
    /// unspecified.
    fn read_window(&mut self, offset: u64, length: u64) -> io::Result<Bytes> {
        self.seek(SeekFrom::Start(offset))?;
        let mut out = vec![0u8; length as usize];
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(Bytes::from(out))
    }
}

/// In-memory source over shared bytes. Also the mmap path: the map is
/// handed to `Bytes::from_owner` so windows stay zero-copy.
pub struct MemorySource {
    data: Bytes,
    pos: u64,
}

impl MemorySource {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    pub fn from_mmap(mmap: Mmap) -> Self {
        Self::new(Bytes::from_owner(mmap))
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, Some(self.data.len() as u64))?;
        Ok(self.pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn read_window(&mut self, offset: u64, length: u64) -> io::Result<Bytes> {
        let start = (offset as usize).min(self.data.len());
        let end = (offset.saturating_add(length) as usize).min(self.data.len());
        Ok(self.data.slice(start..end))
    }
}

/// Seekable file source with buffered reads and explicit position
/// tracking. Seeks inside the buffer stay cheap via `seek_relative`.
pub struct FileSource {
    inner: BufReader<File>,
    pos: u64,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            pos: 0,
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.pos, Some(self.len))?;
        let delta = target as i64 - self.pos as i64;
        self.inner.seek_relative(delta)?;
        self.pos = target;
        Ok(self.pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Forward-only source over any reader. Backward seeks fail; forward
/// seeks skip by reading.
pub struct ForwardSource {
    inner: Box<dyn Read + Send>,
    pos: u64,
}

impl ForwardSource {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
            pos: 0,
        }
    }
}

impl ByteSource for ForwardSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.pos, None)?;
        if target < self.pos {
            return Err(io::Error::other("backward seek on forward-only source"));
        }
        let mut remaining = target - self.pos;
        let mut skip = [0u8; 4096];
        while remaining > 0 {
            let want = skip.len().min(remaining as usize);
            let n = self.read(&mut skip[..want])?;
            if n == 0 {
                break;
            }
            remaining -= n as u64;
        }
        Ok(self.pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

fn resolve_seek(pos: SeekFrom, current: u64, len: Option<u64>) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(o) => o as i128,
        SeekFrom::Current(d) => current as i128 + d as i128,
        SeekFrom::End(d) => match len {
            Some(l) => l as i128 + d as i128,
            None => return Err(io::Error::other("seek from end on unsized source")),
        },
    };
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start",
        ));
    }
    Ok(target as u64)
}

/// The shared single-cursor handle for one document.
///
/// All seek+parse work goes through [`with_cursor`](Self::with_cursor),
/// which serializes cursor movement across threads. Callers that move
/// the cursor restore it before the bracket returns.
#[derive(Clone)]
pub struct SharedSource {
    inner: Arc<Mutex<Box<dyn ByteSource>>>,
    seekable: bool,
    len: Option<u64>,
}

impl SharedSource {
    pub fn new(source: impl ByteSource + 'static) -> Self {
        let seekable = source.is_seekable();
        let len = source.len();
        Self {
            inner: Arc::new(Mutex::new(Box::new(source))),
            seekable,
            len,
        }
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(MemorySource::new(data))
    }

    pub fn from_mmap(mmap: Mmap) -> Self {
        Self::new(MemorySource::from_mmap(mmap))
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(FileSource::open(path)?))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::new(ForwardSource::new(reader))
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Run `f` with exclusive access to the cursor.
    pub fn with_cursor<R>(&self, f: impl FnOnce(&mut dyn ByteSource) -> Result<R>) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Io(io::Error::other("source cursor lock poisoned")))?;
        f(guard.as_mut())
    }

    /// Read a window without disturbing callers: the cursor is restored
    /// before the lock is released.
    pub fn read_window(&self, offset: u64, length: u64) -> Result<Bytes> {
        self.with_cursor(|cur| {
            let saved = cur.position();
            let out = cur.read_window(offset, length)?;
            if cur.is_seekable() {
                cur.seek(SeekFrom::Start(saved))?;
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_read_and_seek() {
        let mut src = MemorySource::new(Bytes::from_static(b"hello world"));
        let mut buf = [0u8; 5];
        src.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(src.position(), 5);
        src.seek(SeekFrom::Start(6)).unwrap();
        src.read(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(src.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_window_is_clamped() {
        let mut src = MemorySource::new(Bytes::from_static(b"0123456789"));
        assert_eq!(src.read_window(4, 3).unwrap(), Bytes::from_static(b"456"));
        assert_eq!(src.read_window(8, 10).unwrap(), Bytes::from_static(b"89"));
        assert_eq!(src.read_window(20, 5).unwrap(), Bytes::new());
    }

    #[test]
    fn test_forward_source_rejects_backward_seek() {
        let mut src = ForwardSource::new(&b"0123456789"[..]);
        src.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(src.position(), 4);
        let mut buf = [0u8; 2];
        src.read(&mut buf).unwrap();
        assert_eq!(&buf, b"45");
        assert!(src.seek(SeekFrom::Start(0)).is_err());
        assert!(!src.is_seekable());
    }

    #[test]
    fn test_shared_source_restores_position_after_window() {
        let src = SharedSource::from_bytes(Bytes::from_static(b"abcdefgh"));
        src.with_cursor(|cur| {
            cur.seek(SeekFrom::Start(3)).map_err(crate::error::Error::from)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(src.read_window(0, 4).unwrap(), Bytes::from_static(b"abcd"));
        let pos = src.with_cursor(|cur| Ok(cur.position())).unwrap();
        assert_eq!(pos, 3);
    }
}
