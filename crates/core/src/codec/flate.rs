//! FlateDecode (zlib) with a lenient path for corrupted tails.

use std::io::Read;

/// Inflate zlib data. On a hard decoder error the lenient path returns
/// whatever decompressed cleanly (truncated tails and bad CRCs near the
/// end are common in the wild).
pub fn flate_decode(data: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_err() {
        tracing::warn!(len = data.len(), "corrupt flate stream, keeping partial output");
        out = decompress_corrupted(data);
    }
    out
}

/// Best-effort zlib decompression: feed one byte at a time and keep the
/// output produced up to the point the decoder fails.
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        if consumed == 0 {
            i += 1;
        } else {
            i += consumed;
        }
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let plain = b"stream payload with some repetition repetition repetition";
        assert_eq!(flate_decode(&deflate(plain)), plain);
    }

    #[test]
    fn test_truncated_stream_keeps_partial_output() {
        let plain: Vec<u8> = (0..200u8).cycle().take(5000).collect();
        let mut compressed = deflate(&plain);
        compressed.truncate(compressed.len() - 6);
        let out = flate_decode(&compressed);
        assert!(!out.is_empty());
        assert!(out.len() <= plain.len());
        assert_eq!(out[..], plain[..out.len()]);
    }

    #[test]
    fn test_garbage_input_yields_empty() {
        assert!(flate_decode(b"not zlib at all").is_empty());
    }
}
