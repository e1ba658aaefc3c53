//! RunLengthDecode.

/// Decode run-length data: a length byte L, then either L+1 literal
/// bytes (L <= 127) or one byte repeated 257-L times (L >= 129). 128 is
/// end-of-data. Truncated runs keep what is present.
pub fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            0..=127 => {
                let count = length as usize + 1;
                let end = (i + count).min(data.len());
                if end < i + count {
                    tracing::warn!("truncated literal run in RunLengthDecode");
                }
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            128 => break,
            _ => {
                let count = 257 - length as usize;
                match data.get(i) {
                    Some(&byte) => {
                        result.extend(std::iter::repeat_n(byte, count));
                        i += 1;
                    }
                    None => {
                        tracing::warn!("truncated repeat run in RunLengthDecode");
                        break;
                    }
                }
            }
        }
    }
    result
}
