//! JPEG 2000 header reading.
//!
//! Only headers are parsed: the JP2 box structure (`jP  `, `jp2h` with
//! `ihdr`/`colr`, `jp2c`) and the main-header `SIZ`/`COD` markers of the
//! codestream. That is enough to describe an encoder's output (dimensions,
//! component count, color space, layer and resolution-level counts)
//! without a wavelet decoder.
//!
//! # Example
//!
//! ```rust,ignore
//! use jp2d_io::jp2;
//!
//! let header = jp2::read_header("derivative.jp2")?;
//! assert_eq!(header.color_space, Some(jp2::EnumeratedColorSpace::Srgb));
//! ```

use crate::detect::{J2K_CODESTREAM, JP2_SIGNATURE};
use crate::probe::{ColorInterpretation, ImageInfo};
use crate::{Format, IoError, IoResult, Orientation};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BOX_JP2_HEADER: [u8; 4] = *b"jp2h";
const BOX_IMAGE_HEADER: [u8; 4] = *b"ihdr";
const BOX_COLOUR: [u8; 4] = *b"colr";
const BOX_CODESTREAM: [u8; 4] = *b"jp2c";

const MARKER_SOC: u16 = 0xFF4F;
const MARKER_SIZ: u16 = 0xFF51;
const MARKER_COD: u16 = 0xFF52;
const MARKER_SOT: u16 = 0xFF90;
const MARKER_SOD: u16 = 0xFF93;

/// Upper bound on bytes read when looking for headers.
const HEADER_LIMIT: u64 = 4 * 1024 * 1024;

/// Enumerated colour space of a `colr` box (method 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnumeratedColorSpace {
    /// 16: sRGB.
    Srgb,
    /// 17: greyscale.
    Greyscale,
    /// 18: sYCC.
    Sycc,
    /// 12: CMYK.
    Cmyk,
    /// Any other registered value.
    Other(u32),
}

impl EnumeratedColorSpace {
    fn from_code(code: u32) -> Self {
        match code {
            16 => Self::Srgb,
            17 => Self::Greyscale,
            18 => Self::Sycc,
            12 => Self::Cmyk,
            other => Self::Other(other),
        }
    }
}

/// Facts read from a JP2 file or raw J2K codestream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Jp2Header {
    /// True for a boxed JP2 file, false for a raw codestream.
    pub boxed: bool,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Number of components.
    pub components: u16,
    /// Bit depth of the first component.
    pub bits_per_component: u8,
    /// Enumerated colour space, when the `colr` box uses method 1.
    pub color_space: Option<EnumeratedColorSpace>,
    /// Restricted ICC profile, when the `colr` box uses method 2.
    #[serde(skip)]
    pub icc_profile: Option<Vec<u8>>,
    /// Quality layers from the COD marker.
    pub quality_layers: Option<u16>,
    /// Wavelet decomposition levels from the COD marker.
    pub decomposition_levels: Option<u8>,
}

impl Jp2Header {
    /// Converts the header into the common probe result.
    pub fn into_info(self) -> ImageInfo {
        let color = match self.color_space {
            Some(EnumeratedColorSpace::Srgb | EnumeratedColorSpace::Sycc) => ColorInterpretation::Srgb,
            Some(EnumeratedColorSpace::Greyscale) => ColorInterpretation::Grayscale,
            Some(EnumeratedColorSpace::Cmyk) => ColorInterpretation::Cmyk,
            Some(EnumeratedColorSpace::Other(_)) => ColorInterpretation::Other,
            None => match self.components {
                1 => ColorInterpretation::Grayscale,
                3 => ColorInterpretation::Srgb,
                _ => ColorInterpretation::Other,
            },
        };

        ImageInfo {
            format: Format::Jp2,
            width: self.width,
            height: self.height,
            samples_per_pixel: self.components,
            bits_per_sample: vec![self.bits_per_component as u16; self.components as usize],
            color,
            icc_profile: self.icc_profile,
            orientation: Orientation::TopLeft,
            page_count: 1,
            file_size: 0,
        }
    }
}

/// Reads the header of a JP2 file or raw J2K codestream.
pub fn read_header<P: AsRef<Path>>(path: P) -> IoResult<Jp2Header> {
    let mut bytes = Vec::new();
    File::open(path.as_ref())?
        .take(HEADER_LIMIT)
        .read_to_end(&mut bytes)?;
    parse_header(&bytes)
}

/// Parses a JP2 or J2K header from memory.
///
/// `data` may be truncated anywhere after the codestream main header.
pub fn parse_header(data: &[u8]) -> IoResult<Jp2Header> {
    if data.starts_with(&J2K_CODESTREAM) {
        let mut header = Jp2Header::default();
        parse_codestream(data, &mut header)?;
        return Ok(header);
    }
    if !data.starts_with(&JP2_SIGNATURE) {
        return Err(IoError::InvalidFile("not a JPEG 2000 file".into()));
    }

    let mut header = Jp2Header {
        boxed: true,
        ..Default::default()
    };
    let mut saw_codestream = false;

    for (kind, body) in boxes(data) {
        match kind {
            BOX_JP2_HEADER => {
                for (kind, body) in boxes(body) {
                    match kind {
                        BOX_IMAGE_HEADER => parse_ihdr(body, &mut header)?,
                        BOX_COLOUR => parse_colr(body, &mut header),
                        _ => {}
                    }
                }
            }
            BOX_CODESTREAM => {
                parse_codestream(body, &mut header)?;
                saw_codestream = true;
                break;
            }
            _ => {}
        }
    }

    if header.width == 0 && !saw_codestream {
        return Err(IoError::InvalidFile("JP2 file has no image header".into()));
    }
    Ok(header)
}

/// Iterates over `(type, body)` pairs of consecutive boxes.
///
/// A box whose declared length runs past the buffer yields the bytes that
/// are present, so truncated reads still expose leading codestream headers.
fn boxes(mut data: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    std::iter::from_fn(move || {
        if data.len() < 8 {
            return None;
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as u64;
        let kind = [data[4], data[5], data[6], data[7]];

        let (header_len, total) = match len {
            0 => (8, data.len() as u64),
            1 => {
                let ext = data.get(8..16)?;
                let mut b = [0u8; 8];
                b.copy_from_slice(ext);
                (16, u64::from_be_bytes(b))
            }
            n => (8, n),
        };
        if total < header_len as u64 {
            return None;
        }

        let end = total.min(data.len() as u64) as usize;
        let body = &data[header_len..end];
        data = &data[end..];
        Some((kind, body))
    })
}

fn parse_ihdr(body: &[u8], header: &mut Jp2Header) -> IoResult<()> {
    if body.len() < 14 {
        return Err(IoError::InvalidFile("truncated ihdr box".into()));
    }
    header.height = read_u32(body, 0);
    header.width = read_u32(body, 4);
    header.components = read_u16(body, 8);
    // 255 means per-component depths in a bpcc box
    if body[10] != 0xFF {
        header.bits_per_component = (body[10] & 0x7F) + 1;
    }
    Ok(())
}

fn parse_colr(body: &[u8], header: &mut Jp2Header) {
    let Some(&method) = body.first() else {
        return;
    };
    match method {
        1 if body.len() >= 7 => {
            header.color_space = Some(EnumeratedColorSpace::from_code(read_u32(body, 3)));
        }
        2 if body.len() > 3 => {
            header.icc_profile = Some(body[3..].to_vec());
        }
        _ => {}
    }
}

fn parse_codestream(data: &[u8], header: &mut Jp2Header) -> IoResult<()> {
    if data.len() < 2 || read_u16(data, 0) != MARKER_SOC {
        return Err(IoError::InvalidFile("codestream does not start with SOC".into()));
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        let marker = read_u16(data, pos);
        if marker == MARKER_SOT || marker == MARKER_SOD {
            break;
        }
        let length = read_u16(data, pos + 2) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            break;
        }
        let segment = &data[pos + 4..pos + 2 + length];

        match marker {
            MARKER_SIZ if segment.len() >= 36 => {
                header.width = read_u32(segment, 2).saturating_sub(read_u32(segment, 10));
                header.height = read_u32(segment, 6).saturating_sub(read_u32(segment, 14));
                header.components = read_u16(segment, 34);
                if let Some(&ssiz) = segment.get(36) {
                    header.bits_per_component = (ssiz & 0x7F) + 1;
                }
            }
            MARKER_COD if segment.len() >= 6 => {
                header.quality_layers = Some(read_u16(segment, 2));
                header.decomposition_levels = Some(segment[5]);
            }
            _ => {}
        }
        pos += 2 + length;
    }

    if header.width == 0 || header.height == 0 {
        return Err(IoError::InvalidFile("codestream has no SIZ marker".into()));
    }
    Ok(())
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
