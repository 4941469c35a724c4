//! JPEG format support (decode only).
//!
//! JPEG sources are accepted by the pipeline but always routed through an
//! intermediate TIFF, so only probing and decoding live here. Decoding is
//! done by `jpeg-decoder`; the embedded ICC profile and the EXIF
//! orientation are carried into [`Metadata`].
//!
//! # Example
//!
//! ```rust,ignore
//! use jp2d_io::jpeg;
//!
//! let image = jpeg::read("photo.jpg")?;
//! println!("{}x{} {:?}", image.width, image.height, image.color);
//! ```

use crate::probe::{ColorInterpretation, ImageInfo};
use crate::{ColorModel, Format, ImageData, IoError, IoResult, Metadata, Orientation, exif};
use jpeg_decoder::{Decoder, PixelFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Probes a JPEG header without decoding the scan data.
pub fn probe<P: AsRef<Path>>(path: P) -> IoResult<ImageInfo> {
    let mut decoder = open(path.as_ref())?;
    decoder.read_info().map_err(decode_error)?;

    let info = decoder
        .info()
        .ok_or_else(|| IoError::DecodeError("missing JPEG info".into()))?;

    let (samples_per_pixel, bits, color) = match info.pixel_format {
        PixelFormat::L8 => (1, 8, ColorInterpretation::Grayscale),
        PixelFormat::L16 => (1, 16, ColorInterpretation::Grayscale),
        PixelFormat::RGB24 => (3, 8, ColorInterpretation::Srgb),
        PixelFormat::CMYK32 => (4, 8, ColorInterpretation::Cmyk),
    };

    Ok(ImageInfo {
        format: Format::Jpeg,
        width: info.width as u32,
        height: info.height as u32,
        samples_per_pixel,
        bits_per_sample: vec![bits; samples_per_pixel as usize],
        color,
        icc_profile: decoder.icc_profile(),
        orientation: orientation(&decoder),
        page_count: 1,
        file_size: 0,
    })
}

/// Reads a JPEG file.
///
/// Samples keep their stored orientation; [`crate::read`] applies it.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<ImageData> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let pixels = decoder.decode().map_err(decode_error)?;

    let info = decoder
        .info()
        .ok_or_else(|| IoError::DecodeError("missing JPEG info".into()))?;
    let (width, height) = (info.width as u32, info.height as u32);

    let mut image = match info.pixel_format {
        PixelFormat::L8 => ImageData::from_u8(width, height, ColorModel::Gray, pixels)?,
        PixelFormat::L16 => {
            // Big-endian sample pairs
            let samples = pixels
                .chunks_exact(2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .collect();
            ImageData::from_u16(width, height, ColorModel::Gray, samples)?
        }
        PixelFormat::RGB24 => ImageData::from_u8(width, height, ColorModel::Rgb, pixels)?,
        PixelFormat::CMYK32 => ImageData::from_u8(width, height, ColorModel::Cmyk, pixels)?,
    };
    image.metadata = Metadata {
        icc_profile: decoder.icc_profile(),
        orientation: orientation(&decoder),
    };

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        pixel_format = ?info.pixel_format,
        "decoded JPEG"
    );
    Ok(image)
}

fn open(path: &Path) -> IoResult<Decoder<BufReader<File>>> {
    Ok(Decoder::new(BufReader::new(File::open(path)?)))
}

fn orientation<R: std::io::Read>(decoder: &Decoder<R>) -> Orientation {
    decoder
        .exif_data()
        .and_then(exif::orientation)
        .unwrap_or_default()
}

fn decode_error(err: jpeg_decoder::Error) -> IoError {
    match err {
        jpeg_decoder::Error::Io(e) => IoError::Io(e),
        other => IoError::DecodeError(other.to_string()),
    }
}
