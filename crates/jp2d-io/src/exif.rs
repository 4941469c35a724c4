//! Minimal EXIF reader: only IFD0 orientation (tag 0x0112) is extracted.

use crate::Orientation;

const ORIENTATION_TAG: u16 = 0x0112;

/// Extracts the orientation from an APP1 EXIF payload.
///
/// Accepts the payload with or without the leading `Exif\0\0` marker.
/// Malformed data yields `None`.
pub(crate) fn orientation(data: &[u8]) -> Option<Orientation> {
    let tiff = data.strip_prefix(b"Exif\0\0").unwrap_or(data);
    if tiff.len() < 8 {
        return None;
    }

    let little = match &tiff[0..2] {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    let u16_at = |off: usize| -> Option<u16> {
        let b = tiff.get(off..off + 2)?;
        Some(if little {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    };
    let u32_at = |off: usize| -> Option<u32> {
        let b = tiff.get(off..off + 4)?;
        let b = [b[0], b[1], b[2], b[3]];
        Some(if little { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
    };

    if u16_at(2)? != 42 {
        return None;
    }
    let ifd = u32_at(4)? as usize;
    let count = u16_at(ifd)? as usize;

    for i in 0..count {
        let entry = ifd + 2 + i * 12;
        if u16_at(entry)? == ORIENTATION_TAG {
            // SHORT value, stored left-justified in the value field
            return Orientation::from_tag(u16_at(entry + 8)?);
        }
    }
    None
}

#[cfg(test)]
pub(crate) fn build(orientation: u16, little: bool) -> Vec<u8> {
    let mut out = b"Exif\0\0".to_vec();
    let (p16, p32): (fn(u16) -> [u8; 2], fn(u32) -> [u8; 4]) = if little {
        (u16::to_le_bytes, u32::to_le_bytes)
    } else {
        (u16::to_be_bytes, u32::to_be_bytes)
    };
    out.extend_from_slice(if little { b"II" } else { b"MM" });
    out.extend_from_slice(&p16(42));
    out.extend_from_slice(&p32(8));
    out.extend_from_slice(&p16(1));
    out.extend_from_slice(&p16(ORIENTATION_TAG));
    out.extend_from_slice(&p16(3));
    out.extend_from_slice(&p32(1));
    out.extend_from_slice(&p16(orientation));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&p32(0));
    out
}
