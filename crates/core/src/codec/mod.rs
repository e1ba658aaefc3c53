//! Stream filter decoding.
//!
//! - `flate`: FlateDecode with a lenient corrupted-tail path
//! - `lzw`: LZWDecode via weezl
//! - `ascii85`: ASCII85Decode and ASCIIHexDecode
//! - `runlength`: RunLengthDecode
//! - `predictor`: PNG/TIFF predictor reversal for Flate/LZW output
//!
//! Image compression filters (DCT, JPX, CCITT, JBIG2) are recognized
//! but passed through untouched: consumers that rasterize take the
//! payload as-is.

pub mod ascii85;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use ascii85::{ascii85_decode, asciihex_decode};
pub use flate::flate_decode;
pub use lzw::lzw_decode;
pub use predictor::apply_predictor;
pub use runlength::run_length_decode;

use bytes::Bytes;

use crate::model::{Dictionary, Name, Object};

/// One step of a stream's filter pipeline.
#[derive(Debug, Clone)]
pub struct FilterStep {
    pub name: Name,
    pub parms: Option<Dictionary>,
}

/// Read `/Filter` and `/DecodeParms` out of a stream dictionary without
/// chasing references. Callers that can resolve indirect values build
/// the chain themselves and call [`apply_chain`].
pub fn filter_chain(dict: &Dictionary) -> Vec<FilterStep> {
    let names: Vec<Name> = match dict.get("Filter") {
        Some(Object::Name(n)) => vec![n.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                Object::Name(n) => Some(n.clone()),
                other => {
                    tracing::warn!(got = other.type_name(), "non-name filter entry skipped");
                    None
                }
            })
            .collect(),
        None => Vec::new(),
        Some(other) => {
            tracing::warn!(got = other.type_name(), "unusable /Filter entry");
            Vec::new()
        }
    };

    let parms: Vec<Option<Dictionary>> = match dict.get_any(&["DecodeParms", "DP"]) {
        Some(Object::Dict(d)) => vec![Some(d.clone())],
        Some(Object::Array(items)) => items
            .iter()
            .map(|o| match o {
                Object::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| FilterStep {
            name,
            parms: parms.get(i).cloned().flatten(),
        })
        .collect()
}

/// Decode a stream payload through a filter chain. Never fails: an
/// unknown or broken filter stops the chain with a warning and returns
/// what has been decoded so far; image filters stop it silently.
pub fn apply_chain(data: Bytes, chain: &[FilterStep]) -> Bytes {
    let mut current = data;
    for step in chain {
        match apply_one(&current, step) {
            Applied::Replaced(out) => current = out.into(),
            Applied::PassThrough => break,
            Applied::Failed => {
                tracing::warn!(filter = %step.name, "filter failed, chain stopped");
                break;
            }
        }
    }
    current
}

/// Decode using the chain written directly in `dict`. This is the
/// parser-side entry point for cross-reference and object streams,
/// whose filters must be direct values.
pub fn decode(dict: &Dictionary, data: Bytes) -> Bytes {
    apply_chain(data, &filter_chain(dict))
}

enum Applied {
    Replaced(Vec<u8>),
    PassThrough,
    Failed,
}

fn apply_one(data: &[u8], step: &FilterStep) -> Applied {
    let empty = Dictionary::new();
    let parms = step.parms.as_ref().unwrap_or(&empty);
    match step.name.as_str() {
        "FlateDecode" | "Fl" => {
            let out = flate_decode(data);
            Applied::Replaced(apply_predictor(out, parms))
        }
        "LZWDecode" | "LZW" => {
            let early = parms
                .get("EarlyChange")
                .and_then(|o| o.as_int().ok())
                .unwrap_or(1)
                != 0;
            match lzw_decode(data, early) {
                Ok(out) => Applied::Replaced(apply_predictor(out, parms)),
                Err(e) => {
                    tracing::warn!(error = %e, "LZWDecode failed");
                    Applied::Failed
                }
            }
        }
        "ASCIIHexDecode" | "AHx" => Applied::Replaced(asciihex_decode(data)),
        "ASCII85Decode" | "A85" => Applied::Replaced(ascii85_decode(data)),
        "RunLengthDecode" | "RL" => Applied::Replaced(run_length_decode(data)),
        "DCTDecode" | "DCT" | "JPXDecode" | "CCITTFaxDecode" | "CCF" | "JBIG2Decode" => {
            tracing::debug!(filter = %step.name, "image filter passed through");
            Applied::PassThrough
        }
        "Crypt" => {
            // Identity crypt filters carry no transformation; real ones
            // are the security manager's concern, applied before decode.
            tracing::debug!("crypt filter passed through");
            Applied::Replaced(data.to_vec())
        }
        other => {
            tracing::warn!(filter = other, "unknown filter");
            Applied::Failed
        }
    }
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

    fn dict_with_filter(name: &str) -> Dictionary {
        let mut d = Dictionary::new();
        d.insert("Filter", Object::Name(Name::new(name)));
        d
    }

    #[test]
    fn test_decode_single_flate() {
        let dict = dict_with_filter("FlateDecode");
        let out = decode(&dict, Bytes::from(deflate(b"hello")));
        assert_eq!(out, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_decode_filter_array_in_order() {
        // ASCIIHex over Flate: outermost filter listed first
        let compressed = deflate(b"payload");
        let hex: String = compressed.iter().map(|b| format!("{b:02X}")).collect();
        let mut d = Dictionary::new();
        d.insert(
            "Filter",
            Object::Array(vec![
                Object::Name(Name::new("ASCIIHexDecode")),
                Object::Name(Name::new("FlateDecode")),
            ]),
        );
        let out = decode(&d, Bytes::from(format!("{hex}>")));
        assert_eq!(out, Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_unknown_filter_keeps_partial_result() {
        let mut d = Dictionary::new();
        d.insert(
            "Filter",
            Object::Array(vec![
                Object::Name(Name::new("ASCIIHexDecode")),
                Object::Name(Name::new("Bogus")),
            ]),
        );
        let out = decode(&d, Bytes::from_static(b"4142>"));
        assert_eq!(out, Bytes::from_static(b"AB"));
    }

    #[test]
    fn test_image_filter_passes_payload_through() {
        let dict = dict_with_filter("DCTDecode");
        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(decode(&dict, jpeg.clone()), jpeg);
    }

    #[test]
    fn test_no_filter_is_identity() {
        let out = decode(&Dictionary::new(), Bytes::from_static(b"raw"));
        assert_eq!(out, Bytes::from_static(b"raw"));
    }

    #[test]
    fn test_abbreviated_names() {
        let dict = dict_with_filter("AHx");
        assert_eq!(
            decode(&dict, Bytes::from_static(b"48 49>")),
            Bytes::from_static(b"HI")
        );
    }
}
