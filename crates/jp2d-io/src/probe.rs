//! Header probing without decoding pixels.
//!
//! [`probe`] is the metadata reader behind every descriptor: it reports
//! the facts the planner needs (layout, color interpretation, embedded
//! profile, page count) by reading container headers only.

use crate::{Format, IoError, IoResult, Orientation, jp2, jpeg, tiff};
use serde::Serialize;
use std::path::Path;

/// Color interpretation of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorInterpretation {
    /// Three-component RGB, assumed sRGB when no profile says otherwise.
    Srgb,
    /// Four-component CMYK (TIFF Separated, Adobe JPEG).
    Cmyk,
    /// Single-component luminance.
    Grayscale,
    /// Anything else (palette, YCbCr TIFF, multiband, ...).
    Other,
}

/// Facts read from an image header.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    /// Detected container format.
    pub format: Format,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Samples per pixel, alpha included.
    pub samples_per_pixel: u16,
    /// Bits per sample, one entry per sample when the container lists them.
    pub bits_per_sample: Vec<u16>,
    /// Color interpretation.
    pub color: ColorInterpretation,
    /// Embedded ICC profile bytes.
    #[serde(skip)]
    pub icc_profile: Option<Vec<u8>>,
    /// Orientation tag, if the container records one.
    pub orientation: Orientation,
    /// Number of pages (TIFF IFDs); 1 for single-image containers.
    pub page_count: usize,
    /// File size in bytes.
    pub file_size: u64,
}

impl ImageInfo {
    /// MIME type of the container.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Returns true if an ICC profile is embedded.
    pub fn has_icc_profile(&self) -> bool {
        self.icc_profile.is_some()
    }

    /// Returns true if the container holds more than one page.
    pub fn is_multi_page(&self) -> bool {
        self.page_count > 1
    }

    /// Widest sample depth.
    pub fn max_bits_per_sample(&self) -> u16 {
        self.bits_per_sample.iter().copied().max().unwrap_or(8)
    }

    /// Uncompressed size of the first page in bytes.
    pub fn uncompressed_size(&self) -> u64 {
        let bits: u64 = if self.bits_per_sample.len() == self.samples_per_pixel as usize {
            self.bits_per_sample.iter().map(|&b| b as u64).sum()
        } else {
            self.samples_per_pixel as u64 * self.max_bits_per_sample() as u64
        };
        self.width as u64 * self.height as u64 * bits / 8
    }
}

/// Probes the header of an image file.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFormat`] for containers other than TIFF,
/// JPEG and JP2, and decode errors for malformed headers.
pub fn probe<P: AsRef<Path>>(path: P) -> IoResult<ImageInfo> {
    let path = path.as_ref();
    let format = Format::detect(path)?;
    tracing::trace!(path = %path.display(), ?format, "probe");

    let mut info = match format {
        Format::Tiff => tiff::probe(path)?,
        Format::Jpeg => jpeg::probe(path)?,
        Format::Jp2 => jp2::read_header(path)?.into_info(),
        other => return Err(IoError::UnsupportedFormat(other.mime_type().to_string())),
    };
    info.file_size = std::fs::metadata(path)?.len();

    Ok(info)
}
