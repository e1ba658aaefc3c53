//! LZWDecode via weezl.

use crate::error::{Error, Result};
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW data. `early_change` selects the one-code-early table
/// growth that PDF defaults to (`/EarlyChange 1`).
pub fn lzw_decode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut decoder = if early_change {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    decoder
        .decode(data)
        .map_err(|e| Error::Decode(format!("lzw: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lzw_round_trip() {
        let plain = b"ababababababababababab";
        let encoded = weezl::encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(plain)
            .unwrap();
        assert_eq!(lzw_decode(&encoded, true).unwrap(), plain);
    }

    #[test]
    fn test_lzw_garbage_is_an_error() {
        assert!(lzw_decode(&[0xFF, 0xFE, 0xFD, 0x00, 0x01], true).is_err());
    }
}
