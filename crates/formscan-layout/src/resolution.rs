//! Image resolution metadata
//!
//! Reads the horizontal pixel density stored in PNG (`pHYs`), JPEG (JFIF
//! `APP0`) and TIFF (`XResolution`/`ResolutionUnit` in the first IFD)
//! headers. Images without usable metadata get `None`, and the caller falls
//! back to the configured default.

// Densities are small positive numbers
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const METRES_PER_INCH: f64 = 0.0254;
const CM_PER_INCH: f64 = 2.54;

/// Horizontal resolution in dots per inch, if the encoded image declares one
#[must_use]
pub fn dpi_from_bytes(bytes: &[u8]) -> Option<u32> {
    if bytes.starts_with(PNG_SIGNATURE) {
        png_dpi(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        jfif_dpi(bytes)
    } else if bytes.starts_with(b"II*\0") {
        tiff_dpi(bytes, false)
    } else if bytes.starts_with(b"MM\0*") {
        tiff_dpi(bytes, true)
    } else {
        None
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn tiff_u16(bytes: &[u8], at: usize, big_endian: bool) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    let b = [b[0], b[1]];
    Some(if big_endian {
        u16::from_be_bytes(b)
    } else {
        u16::from_le_bytes(b)
    })
}

fn tiff_u32(bytes: &[u8], at: usize, big_endian: bool) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    let b = [b[0], b[1], b[2], b[3]];
    Some(if big_endian {
        u32::from_be_bytes(b)
    } else {
        u32::from_le_bytes(b)
    })
}

fn non_zero(dpi: f64) -> Option<u32> {
    let dpi = dpi.round();
    (dpi >= 1.0 && dpi <= f64::from(u32::MAX)).then_some(dpi as u32)
}

/// Walk PNG chunks up to the image data looking for `pHYs`
fn png_dpi(bytes: &[u8]) -> Option<u32> {
    let mut offset = PNG_SIGNATURE.len();
    loop {
        let length = be_u32(bytes, offset)? as usize;
        let kind = bytes.get(offset + 4..offset + 8)?;
        let data = offset + 8;
        match kind {
            b"pHYs" => {
                let pixels_per_unit = be_u32(bytes, data)?;
                // Unit 1 is the metre; 0 only gives an aspect ratio
                let unit = *bytes.get(data + 8)?;
                return if unit == 1 {
                    non_zero(f64::from(pixels_per_unit) * METRES_PER_INCH)
                } else {
                    None
                };
            }
            b"IDAT" | b"IEND" => return None,
            _ => offset = data.checked_add(length)?.checked_add(4)?,
        }
    }
}

/// Walk JPEG marker segments looking for a JFIF `APP0` density
fn jfif_dpi(bytes: &[u8]) -> Option<u32> {
    let mut offset = 2;
    loop {
        if *bytes.get(offset)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(offset + 1)?;
        // Start of scan: no more header segments
        if marker == 0xDA {
            return None;
        }
        let length = usize::from(be_u16(bytes, offset + 2)?);
        let segment = offset + 4;
        if marker == 0xE0 && bytes.get(segment..segment + 5)? == b"JFIF\0" {
            let units = *bytes.get(segment + 7)?;
            let density = f64::from(be_u16(bytes, segment + 8)?);
            return match units {
                1 => non_zero(density),
                2 => non_zero(density * CM_PER_INCH),
                _ => None,
            };
        }
        offset = offset + 2 + length;
    }
}

const TIFF_X_RESOLUTION: u16 = 282;
const TIFF_RESOLUTION_UNIT: u16 = 296;
const TIFF_RATIONAL: u16 = 5;

/// Read `XResolution` and `ResolutionUnit` from the first TIFF IFD
fn tiff_dpi(bytes: &[u8], big_endian: bool) -> Option<u32> {
    let ifd = tiff_u32(bytes, 4, big_endian)? as usize;
    let count = usize::from(tiff_u16(bytes, ifd, big_endian)?);

    let mut density = None;
    // Inch is the TIFF default when the unit tag is absent
    let mut unit = 2;
    for i in 0..count {
        let entry = ifd.checked_add(2 + 12 * i)?;
        let tag = tiff_u16(bytes, entry, big_endian)?;
        let kind = tiff_u16(bytes, entry + 2, big_endian)?;
        match tag {
            TIFF_X_RESOLUTION if kind == TIFF_RATIONAL => {
                let at = tiff_u32(bytes, entry + 8, big_endian)? as usize;
                let numerator = tiff_u32(bytes, at, big_endian)?;
                let denominator = tiff_u32(bytes, at.checked_add(4)?, big_endian)?;
                if denominator != 0 {
                    density = Some(f64::from(numerator) / f64::from(denominator));
                }
            }
            TIFF_RESOLUTION_UNIT => unit = tiff_u16(bytes, entry + 8, big_endian)?,
            _ => {}
        }
    }

    match unit {
        2 => non_zero(density?),
        3 => non_zero(density? * CM_PER_INCH),
        _ => None,
    }
}
