//! Format detection utilities.
//!
//! Detects image formats from magic bytes, falling back to file extensions.

use crate::IoResult;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// JP2 signature box: length 12, type `jP  `, payload `\r\n\x87\n`.
pub(crate) const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

/// Raw JPEG 2000 codestream: SOC followed by SIZ.
pub(crate) const J2K_CODESTREAM: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Image container formats known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// TIFF or BigTIFF.
    Tiff,
    /// JPEG/JFIF.
    Jpeg,
    /// JPEG 2000, boxed or raw codestream.
    Jp2,
    /// PNG, recognized but not accepted as a source.
    Png,
    /// Unknown/unsupported format.
    Unknown,
}

impl Format {
    /// Detects format from file path (magic bytes + extension).
    ///
    /// Magic bytes win; the extension is only consulted when the header
    /// is not recognized.
    pub fn detect<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();

        let format = Self::from_magic_bytes(path)?;
        if format != Format::Unknown {
            return Ok(format);
        }

        Ok(Self::from_extension(path))
    }

    /// Detects format from file extension only.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("tif") | Some("tiff") => Format::Tiff,
            Some("jpg") | Some("jpeg") => Format::Jpeg,
            Some("jp2") | Some("j2k") | Some("j2c") | Some("jpx") => Format::Jp2,
            Some("png") => Format::Png,
            _ => Format::Unknown,
        }
    }

    /// Detects format from file magic bytes.
    pub fn from_magic_bytes<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 12];

        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(Self::from_bytes(&header[..filled]))
    }

    /// Detects format from raw bytes (magic number check).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() < 4 {
            return Format::Unknown;
        }

        if bytes[0..3] == [0xFF, 0xD8, 0xFF] {
            return Format::Jpeg;
        }

        // Classic TIFF (42) and BigTIFF (43), either byte order
        match bytes[0..4] {
            [0x49, 0x49, 0x2A, 0x00] | [0x4D, 0x4D, 0x00, 0x2A] => return Format::Tiff,
            [0x49, 0x49, 0x2B, 0x00] | [0x4D, 0x4D, 0x00, 0x2B] => return Format::Tiff,
            _ => {}
        }

        if bytes[0..4] == J2K_CODESTREAM {
            return Format::Jp2;
        }
        if bytes.len() >= 12 && bytes[0..12] == JP2_SIGNATURE {
            return Format::Jp2;
        }

        if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
            return Format::Png;
        }

        Format::Unknown
    }

    /// Returns the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Tiff => "tif",
            Format::Jpeg => "jpg",
            Format::Jp2 => "jp2",
            Format::Png => "png",
            Format::Unknown => "",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Tiff => "image/tiff",
            Format::Jpeg => "image/jpeg",
            Format::Jp2 => "image/jp2",
            Format::Png => "image/png",
            Format::Unknown => "application/octet-stream",
        }
    }
}
