//! # jp2d-io
//!
//! Raster I/O for JP2 derivative generation.
//!
//! This crate covers everything the derivative pipeline needs to know about
//! image containers, without ever touching color math:
//!
//! - **Probing** - [`probe`] reads dimensions, sample layout, embedded ICC
//!   profile and page count from a file header
//! - **Decoding** - [`read`] loads the first page of a TIFF or JPEG into an
//!   [`ImageData`] buffer, auto-rotated according to its orientation tag
//! - **Encoding** - [`tiff::write`] writes an uncompressed TIFF, optionally in
//!   the 64-bit-offset BigTIFF layout
//! - **JP2 headers** - [`jp2::read_header`] inspects a JPEG 2000 file so the
//!   output of an encoder can be described like any other image
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use jp2d_io::{probe, read, tiff};
//!
//! let info = probe("scan.tif")?;
//! println!("{}x{} {:?}", info.width, info.height, info.color);
//!
//! let image = read("scan.tif")?;
//! tiff::write("normalized.tif", &image, tiff::TiffWriteOptions { big_tiff: true })?;
//! ```
//!
//! # Supported Formats
//!
//! | Format | Probe | Read | Write | Notes |
//! |--------|-------|------|-------|-------|
//! | TIFF | Yes | Yes | Yes | 1/8/16-bit, Gray/RGB/RGBA/CMYK, ICC, BigTIFF |
//! | JPEG | Yes | Yes | No | Gray/RGB/CMYK, ICC, EXIF orientation |
//! | JP2 | Yes | No | No | Box header and raw codestream SIZ only |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod detect;
mod error;
mod exif;
pub mod jp2;
pub mod jpeg;
pub mod orientation;
pub mod probe;
pub mod tiff;

pub use detect::Format;
pub use error::{IoError, IoResult};
pub use orientation::Orientation;
pub use probe::{ColorInterpretation, ImageInfo, probe};

use std::path::Path;

/// Reads the first page of an image, auto-detecting the format.
///
/// The returned buffer is already rotated upright; its
/// [`Metadata::orientation`] is reset to [`Orientation::TopLeft`].
///
/// # Errors
///
/// Returns an error if the file cannot be opened, is not a TIFF or JPEG,
/// or uses a sample layout the decoders do not handle.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<ImageData> {
    let path = path.as_ref();
    let format = Format::detect(path)?;

    let image = match format {
        Format::Tiff => tiff::read(path)?,
        Format::Jpeg => jpeg::read(path)?,
        other => return Err(IoError::UnsupportedFormat(other.mime_type().to_string())),
    };

    Ok(image.oriented())
}

/// Image data container for I/O operations.
///
/// Holds interleaved samples at their native bit depth together with
/// the container metadata the color pipeline needs.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Channel arrangement of [`ImageData::data`].
    pub color: ColorModel,
    /// Interleaved samples.
    pub data: PixelData,
    /// Container metadata.
    pub metadata: Metadata,
}

/// Channel arrangement of an interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    /// Single luminance channel.
    Gray,
    /// Luminance plus alpha.
    GrayAlpha,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Cyan, magenta, yellow, key.
    Cmyk,
}

impl ColorModel {
    /// Total number of interleaved channels.
    pub fn channels(self) -> usize {
        match self {
            ColorModel::Gray => 1,
            ColorModel::GrayAlpha => 2,
            ColorModel::Rgb => 3,
            ColorModel::Rgba | ColorModel::Cmyk => 4,
        }
    }

    /// Number of channels that carry color (alpha excluded).
    pub fn color_channels(self) -> usize {
        if self.has_alpha() {
            self.channels() - 1
        } else {
            self.channels()
        }
    }

    /// Returns true if the last channel is alpha.
    pub fn has_alpha(self) -> bool {
        matches!(self, ColorModel::GrayAlpha | ColorModel::Rgba)
    }

    /// Returns true for the three-component RGB models.
    pub fn is_rgb(self) -> bool {
        matches!(self, ColorModel::Rgb | ColorModel::Rgba)
    }
}

/// Raw pixel data storage.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// 8-bit unsigned data.
    U8(Vec<u8>),
    /// 16-bit unsigned data.
    U16(Vec<u16>),
}

impl PixelData {
    /// Bits per sample.
    pub fn bits(&self) -> u16 {
        match self {
            PixelData::U8(_) => 8,
            PixelData::U16(_) => 16,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(d) => d.len(),
            PixelData::U16(d) => d.len(),
        }
    }

    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Container metadata carried alongside the pixels.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Embedded ICC profile bytes.
    pub icc_profile: Option<Vec<u8>>,
    /// Orientation recorded by the container.
    pub orientation: Orientation,
}

impl ImageData {
    /// Creates ImageData from u8 samples.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if the sample count does not
    /// match `width * height * channels`.
    pub fn from_u8(width: u32, height: u32, color: ColorModel, data: Vec<u8>) -> IoResult<Self> {
        Self::with_data(width, height, color, PixelData::U8(data))
    }

    /// Creates ImageData from u16 samples.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if the sample count does not
    /// match `width * height * channels`.
    pub fn from_u16(width: u32, height: u32, color: ColorModel, data: Vec<u16>) -> IoResult<Self> {
        Self::with_data(width, height, color, PixelData::U16(data))
    }

    fn with_data(width: u32, height: u32, color: ColorModel, data: PixelData) -> IoResult<Self> {
        let expected = width as usize * height as usize * color.channels();
        if data.len() != expected {
            return Err(IoError::DimensionMismatch {
                expected: format!("{} samples ({}x{}x{})", expected, width, height, color.channels()),
                actual: format!("{} samples", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            color,
            data,
            metadata: Metadata::default(),
        })
    }

    /// Returns the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bits per sample.
    pub fn bits_per_sample(&self) -> u16 {
        self.data.bits()
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.color.channels()
    }

    /// Applies the recorded orientation to the pixels.
    ///
    /// Rotations by 90 degrees swap width and height.
    pub fn oriented(self) -> Self {
        let orientation = self.metadata.orientation;
        if orientation == Orientation::TopLeft {
            return self;
        }

        let channels = self.channels();
        let (data, width, height) = match &self.data {
            PixelData::U8(d) => {
                let (out, w, h) = orientation.apply(d, self.width, self.height, channels);
                (PixelData::U8(out), w, h)
            }
            PixelData::U16(d) => {
                let (out, w, h) = orientation.apply(d, self.width, self.height, channels);
                (PixelData::U16(out), w, h)
            }
        };

        tracing::debug!(?orientation, width, height, "applied orientation");

        Self {
            width,
            height,
            color: self.color,
            data,
            metadata: Metadata {
                icc_profile: self.metadata.icc_profile,
                orientation: Orientation::TopLeft,
            },
        }
    }

    /// Drops the alpha channel, if any.
    pub fn without_alpha(self) -> Self {
        if !self.color.has_alpha() {
            return self;
        }
        let channels = self.channels();
        let keep = self.color.color_channels();
        let color = match self.color {
            ColorModel::GrayAlpha => ColorModel::Gray,
            _ => ColorModel::Rgb,
        };
        let data = match self.data {
            PixelData::U8(d) => PixelData::U8(strip_channel(&d, channels, keep)),
            PixelData::U16(d) => PixelData::U16(strip_channel(&d, channels, keep)),
        };
        Self { color, data, ..self }
    }
}

fn strip_channel<T: Copy>(data: &[T], channels: usize, keep: usize) -> Vec<T> {
    data.chunks_exact(channels)
        .flat_map(|px| px[..keep].iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_checks_length() {
        assert!(ImageData::from_u8(2, 2, ColorModel::Rgb, vec![0; 12]).is_ok());
        let err = ImageData::from_u8(2, 2, ColorModel::Rgb, vec![0; 11]).unwrap_err();
        assert!(matches!(err, IoError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_color_model_channels() {
        assert_eq!(ColorModel::Gray.channels(), 1);
        assert_eq!(ColorModel::Rgba.color_channels(), 3);
        assert_eq!(ColorModel::Cmyk.color_channels(), 4);
        assert!(ColorModel::Rgba.is_rgb());
        assert!(!ColorModel::Cmyk.is_rgb());
    }

    #[test]
    fn test_without_alpha() {
        let image = ImageData::from_u8(1, 2, ColorModel::Rgba, vec![1, 2, 3, 255, 4, 5, 6, 128]).unwrap();
        let rgb = image.without_alpha();
        assert_eq!(rgb.color, ColorModel::Rgb);
        assert_eq!(rgb.data, PixelData::U8(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_oriented_swaps_dimensions() {
        let mut image = ImageData::from_u8(3, 1, ColorModel::Gray, vec![1, 2, 3]).unwrap();
        image.metadata.orientation = Orientation::RightTop;
        let rotated = image.oriented();
        assert_eq!((rotated.width, rotated.height), (1, 3));
        assert_eq!(rotated.metadata.orientation, Orientation::TopLeft);
        assert_eq!(rotated.data, PixelData::U8(vec![1, 2, 3]));
    }
}
