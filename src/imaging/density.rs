//! Minimal resolution (DPI) reader for JPEG and PNG files.
//!
//! The `image` crate decodes pixels but drops physical density, which derived
//! images must inherit from their source. Two fields are read:
//! - JPEG: JFIF APP0 (`0xFFE0`) density units + X/Y density.
//! - PNG: `pHYs` chunk (pixels per unit, unit 1 = metre).
//!
//! Anything else, or any parse failure, yields `None` and the caller keeps
//! the default resolution.

use super::params::Resolution;

const JFIF_IDENTIFIER: &[u8] = b"JFIF\0";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const INCHES_PER_METRE: f32 = 39.3701;
const CM_PER_INCH: f32 = 2.54;

/// Read the physical resolution embedded in encoded image bytes.
pub fn read_resolution(data: &[u8]) -> Option<Resolution> {
    if data.starts_with(&[0xFF, 0xD8]) {
        read_jfif_density(data)
    } else if data.starts_with(PNG_SIGNATURE) {
        read_png_phys(data)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JPEG: JFIF APP0 density
// ---------------------------------------------------------------------------

/// Walk JPEG marker segments until APP0/JFIF or start-of-scan.
///
/// APP0 JFIF payload layout:
///   Bytes 0-4:  "JFIF\0"
///   Bytes 5-6:  version
///   Byte 7:     units (0 = aspect only, 1 = dots/inch, 2 = dots/cm)
///   Bytes 8-11: X density, Y density (big-endian u16)
fn read_jfif_density(data: &[u8]) -> Option<Resolution> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes between markers
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS (0xDA) means image data starts; stop scanning
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        if seg_len < 2 || seg_start > seg_end {
            return None;
        }

        if marker == 0xE0 {
            let segment = &data[seg_start..seg_end];
            if segment.len() >= 12 && segment.starts_with(JFIF_IDENTIFIER) {
                let units = segment[7];
                let x = u16::from_be_bytes([segment[8], segment[9]]) as f32;
                let y = u16::from_be_bytes([segment[10], segment[11]]) as f32;
                return jfif_to_dpi(units, x, y);
            }
        }

        pos += 2 + seg_len;
    }
    None
}

fn jfif_to_dpi(units: u8, x: f32, y: f32) -> Option<Resolution> {
    if x == 0.0 || y == 0.0 {
        return None;
    }
    match units {
        1 => Some(Resolution::dpi(x, y)),
        2 => Some(Resolution::dpi(x * CM_PER_INCH, y * CM_PER_INCH)),
        // Aspect ratio only: no physical size
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PNG: pHYs chunk
// ---------------------------------------------------------------------------

/// Walk PNG chunks until `pHYs` or `IDAT`.
///
/// Chunk layout: length (u32 BE), type (4 bytes), data, CRC (4 bytes).
/// `pHYs` data: X ppu (u32 BE), Y ppu (u32 BE), unit (1 = metre).
fn read_png_phys(data: &[u8]) -> Option<Resolution> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start.checked_add(length)?;
        if body_end > data.len() {
            return None;
        }

        match kind {
            b"pHYs" if length >= 9 => {
                let body = &data[body_start..body_end];
                let x = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f32;
                let y = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as f32;
                if body[8] != 1 || x == 0.0 || y == 0.0 {
                    return None;
                }
                return Some(Resolution::dpi(
                    (x / INCHES_PER_METRE).round(),
                    (y / INCHES_PER_METRE).round(),
                ));
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }

        pos = body_end + 4;
    }
    None
}
