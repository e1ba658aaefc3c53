//! Stream objects with lazily materialized payloads.

use bytes::Bytes;
use std::sync::OnceLock;

use super::objects::Dictionary;
use super::typed::StreamKind;

/// Where a stream's raw payload lives.
///
/// Seekable sources record a window into the file and never copy the
/// payload at parse time; forward-only sources (and recovery paths that
/// already hold the bytes) buffer it.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// Byte range in the underlying source.
    Window { offset: u64, length: u64 },
    /// Payload captured at parse time.
    Buffered(Bytes),
}

/// Stream object: dictionary plus raw payload location.
///
/// The decoded payload is memoized on first decode; cloning the handle
/// (streams are shared behind `Arc`) shares the memo.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: StreamData,
    pub kind: StreamKind,
    decoded: OnceLock<Bytes>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: StreamData, kind: StreamKind) -> Self {
        Self {
            dict,
            data,
            kind,
            decoded: OnceLock::new(),
        }
    }

    /// Length of the raw payload in bytes.
    pub fn raw_len(&self) -> u64 {
        match &self.data {
            StreamData::Window { length, .. } => *length,
            StreamData::Buffered(b) => b.len() as u64,
        }
    }

    /// Raw payload if it is already in memory.
    pub fn buffered(&self) -> Option<Bytes> {
        match &self.data {
            StreamData::Buffered(b) => Some(b.clone()),
            StreamData::Window { .. } => None,
        }
    }

    /// Previously decoded payload, if any.
    pub fn decoded_cached(&self) -> Option<Bytes> {
        self.decoded.get().cloned()
    }

    /// Store a decoded payload; returns the winning copy if another
    /// thread got there first.
    pub fn memoize_decoded(&self, data: Bytes) -> Bytes {
        self.decoded.get_or_init(|| data).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_len() {
        let s = Stream::new(
            Dictionary::new(),
            StreamData::Window {
                offset: 100,
                length: 42,
            },
            StreamKind::Other,
        );
        assert_eq!(s.raw_len(), 42);
        assert!(s.buffered().is_none());

        let b = Stream::new(
            Dictionary::new(),
            StreamData::Buffered(Bytes::from_static(b"abc")),
            StreamKind::Other,
        );
        assert_eq!(b.raw_len(), 3);
        assert_eq!(b.buffered(), Some(Bytes::from_static(b"abc")));
    }

    #[test]
    fn test_decode_memo_keeps_first_value() {
        let s = Stream::new(
            Dictionary::new(),
            StreamData::Buffered(Bytes::new()),
            StreamKind::Other,
        );
        assert!(s.decoded_cached().is_none());
        let won = s.memoize_decoded(Bytes::from_static(b"first"));
        assert_eq!(won, Bytes::from_static(b"first"));
        let lost = s.memoize_decoded(Bytes::from_static(b"second"));
        assert_eq!(lost, Bytes::from_static(b"first"));
        assert_eq!(s.decoded_cached(), Some(Bytes::from_static(b"first")));
    }
}
