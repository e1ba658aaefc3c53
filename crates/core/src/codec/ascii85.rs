//! Text-armor filters: ASCII85 and ASCIIHex.

/// Decode the PDF flavor of ASCII85.
///
/// Accepts optional `<~`/`~>` framing, expands the `z` shorthand for an
/// all-zero group, skips whitespace, and tolerates a truncated final
/// group (as produced by some writers that omit the EOD marker).
pub fn ascii85_decode(data: &[u8]) -> Vec<u8> {
    let data = match data.strip_prefix(b"<~") {
        Some(rest) => rest,
        None => data,
    };

    // Everything after the first '~' is the EOD marker or junk
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut filtered = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'\x00' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ' => {}
            b'z' => filtered.extend_from_slice(b"!!!!!"),
            b'!'..=b'u' => filtered.push(byte),
            _ => {}
        }
    }

    let mut result = Vec::with_capacity(filtered.len() / 5 * 4 + 4);
    for chunk in filtered.chunks(5) {
        if chunk.len() == 5 {
            let mut value: u32 = 0;
            for &byte in chunk {
                value = value.wrapping_mul(85).wrapping_add((byte - b'!') as u32);
            }
            result.extend_from_slice(&value.to_be_bytes());
        } else if chunk.len() > 1 {
            // A short group of n chars yields n-1 bytes; pad with 'u'
            // (the highest digit) so truncation rounds the right way.
            let mut padded = [b'u'; 5];
            padded[..chunk.len()].copy_from_slice(chunk);
            let mut value: u32 = 0;
            for &byte in &padded {
                value = value.wrapping_mul(85).wrapping_add((byte - b'!') as u32);
            }
            let bytes = value.to_be_bytes();
            result.extend_from_slice(&bytes[..chunk.len() - 1]);
        }
    }
    result
}

/// Decode ASCIIHex data. Non-hex bytes are skipped, `>` terminates,
/// and an odd trailing digit acts as the high nibble of a final byte.
pub fn asciihex_decode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        let Some(nibble) = (byte as char).to_digit(16) else {
            continue;
        };
        match pending.take() {
            Some(high) => result.push((high << 4) | nibble as u8),
            None => pending = Some(nibble as u8),
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asciihex_decode() {
        assert_eq!(
            asciihex_decode(b"48656c6c6f 20776f726c64>"),
            b"Hello world"
        );
        assert_eq!(asciihex_decode(b"4>trailing junk"), vec![0x40]);
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(ascii85_decode(b"<~87cURD]i,\"Ebo7~>"), b"Hello World");
        // No markers, partial final group
        assert_eq!(ascii85_decode(b"87cURDZ"), b"Hello");
    }

    #[test]
    fn test_ascii85_z_expansion() {
        assert_eq!(ascii85_decode(b"z~>"), vec![0, 0, 0, 0]);
    }
}
