//! Predictor reversal for Flate/LZW streams (`/DecodeParms`).

use crate::model::Dictionary;

/// Apply the predictor named in `parms` to freshly inflated data.
/// Predictor 1 (or absent) is a no-op, 2 is TIFF horizontal
/// differencing, >= 10 are the PNG row filters.
pub fn apply_predictor(data: Vec<u8>, parms: &Dictionary) -> Vec<u8> {
    let predictor = parms
        .get("Predictor")
        .and_then(|p| p.as_int().ok())
        .unwrap_or(1);
    if predictor < 2 {
        return data;
    }

    let columns = parms
        .get("Columns")
        .and_then(|c| c.as_int().ok())
        .unwrap_or(1)
        .max(1) as usize;
    let colors = parms
        .get("Colors")
        .and_then(|c| c.as_int().ok())
        .unwrap_or(1)
        .max(1) as usize;
    let bits = parms
        .get("BitsPerComponent")
        .and_then(|b| b.as_int().ok())
        .unwrap_or(8)
        .max(1) as usize;

    match predictor {
        2 => apply_tiff_predictor(data, columns, colors, bits),
        p if p >= 10 => apply_png_predictor(&data, columns, colors, bits),
        p => {
            tracing::warn!(predictor = p, "unknown predictor, data left as-is");
            data
        }
    }
}

/// TIFF predictor 2: horizontal differencing. Only the 8-bit component
/// case is handled; other widths pass through with a warning.
fn apply_tiff_predictor(mut data: Vec<u8>, columns: usize, colors: usize, bits: usize) -> Vec<u8> {
    if bits != 8 {
        tracing::warn!(bits, "TIFF predictor with sub-byte components unsupported");
        return data;
    }
    let row_bytes = columns * colors;
    if row_bytes == 0 {
        return data;
    }
    for row in data.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    data
}

/// Reverse PNG row prediction. Each row is prefixed with a filter-type
/// byte; unknown types copy the row through.
fn apply_png_predictor(data: &[u8], columns: usize, colors: usize, bits: usize) -> Vec<u8> {
    let row_bytes = (colors * columns * bits).div_ceil(8);
    let bpp = std::cmp::max(1, colors * bits / 8); // bytes per pixel
    let row_size = row_bytes + 1; // +1 for the filter byte

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row_start in (0..data.len()).step_by(row_size) {
        if row_start + row_size > data.len() {
            if row_start < data.len() {
                tracing::warn!(
                    trailing = data.len() - row_start,
                    "short predictor row dropped"
                );
            }
            break;
        }

        let filter_type = data[row_start];
        let row_data = &data[row_start + 1..row_start + row_size];
        let mut current_row = vec![0u8; row_bytes];

        match filter_type {
            0 => {
                current_row.copy_from_slice(row_data);
            }
            1 => {
                // Sub: left neighbor
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                // Up: byte above
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average of left and above
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        current_row[i - bpp] as u16
                    } else {
                        0
                    };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let paeth = paeth_predictor(left, above, upper_left);
                    current_row[i] = row_data[i].wrapping_add(paeth);
                }
            }
            t => {
                tracing::warn!(filter = t, "unknown PNG filter type, row copied");
                current_row.copy_from_slice(row_data);
            }
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    result
}

fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
