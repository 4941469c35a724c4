//! TIFF format support.
//!
//! Reads classic and BigTIFF files at their native bit depth and writes
//! uncompressed pages, which is the intermediate form JP2 encoders expect.
//!
//! # Features
//!
//! - 1-bit (expanded), 8-bit and 16-bit samples
//! - Gray, gray+alpha, RGB, RGBA and CMYK
//! - Embedded ICC profile (tag 34675) and orientation (tag 274)
//! - BigTIFF output for rasters past the 4 GiB offset limit
//! - Page counting for multi-page files
//! - In-place ICC embedding that leaves pixel data untouched
//!
//! # Example
//!
//! ```rust,ignore
//! use jp2d_io::tiff;
//!
//! let image = tiff::read("scan.tif")?;
//! tiff::write("normalized.tif", &image, tiff::TiffWriteOptions { big_tiff: true })?;
//! ```

use crate::probe::{ColorInterpretation, ImageInfo};
use crate::{ColorModel, Format, ImageData, IoError, IoResult, Metadata, Orientation, PixelData};
use ::tiff::decoder::{Decoder, DecodingResult, Limits};
use ::tiff::encoder::colortype::{self, ColorType as EncoderColor};
use ::tiff::encoder::{TiffEncoder, TiffKind, TiffValue};
use ::tiff::tags::{Tag, Type};
use ::tiff::{ColorType, TiffError};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const TAG_ICC_PROFILE: u16 = 34675;
const TAG_ORIENTATION: u16 = 274;

const TYPE_UNDEFINED: u16 = 7;
const MAX_IFD_ENTRIES: u64 = 4096;

const PHOTOMETRIC_WHITE_IS_ZERO: u16 = 0;
const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;
const PHOTOMETRIC_SEPARATED: u16 = 5;

/// Options for [`write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TiffWriteOptions {
    /// Write the 64-bit-offset BigTIFF layout.
    pub big_tiff: bool,
}

/// Probes a TIFF header: layout, color interpretation, ICC, orientation
/// and page count. Pixels are not decoded.
pub fn probe<P: AsRef<Path>>(path: P) -> IoResult<ImageInfo> {
    let mut decoder = open(path.as_ref())?;

    let (width, height) = decoder.dimensions()?;
    let samples_per_pixel = tag_u16(&mut decoder, Tag::SamplesPerPixel)?.unwrap_or(1);
    let bits_per_sample = match decoder.find_tag(Tag::BitsPerSample)? {
        Some(value) => value.into_u16_vec()?,
        None => vec![1],
    };
    let photometric = tag_u16(&mut decoder, Tag::PhotometricInterpretation)?;
    let icc_profile = icc_profile(&mut decoder)?;
    let orientation = orientation(&mut decoder)?;

    let color = match photometric {
        Some(PHOTOMETRIC_WHITE_IS_ZERO | PHOTOMETRIC_BLACK_IS_ZERO) => ColorInterpretation::Grayscale,
        Some(PHOTOMETRIC_RGB) => ColorInterpretation::Srgb,
        Some(PHOTOMETRIC_SEPARATED) if samples_per_pixel >= 4 => ColorInterpretation::Cmyk,
        _ => ColorInterpretation::Other,
    };

    let mut page_count = 1;
    while decoder.more_images() {
        decoder.next_image()?;
        page_count += 1;
    }

    Ok(ImageInfo {
        format: Format::Tiff,
        width,
        height,
        samples_per_pixel,
        bits_per_sample,
        color,
        icc_profile,
        orientation,
        page_count,
        file_size: 0,
    })
}

/// Reads the first page of a TIFF file.
///
/// Samples keep their stored orientation; [`crate::read`] applies it.
/// 1-bit bilevel data is expanded to 8-bit. The decoder flips WhiteIsZero
/// samples, so gray output is always BlackIsZero.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<ImageData> {
    let path = path.as_ref();
    let mut decoder = open(path)?;

    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    let metadata = Metadata {
        icc_profile: icc_profile(&mut decoder)?,
        orientation: orientation(&mut decoder)?,
    };

    let result = decoder.read_image()?;
    let (color, data) = match (color_type, result) {
        (ColorType::Gray(1), DecodingResult::U8(buf)) => {
            (ColorModel::Gray, PixelData::U8(expand_bilevel(&buf, width, height)))
        }
        (ColorType::Gray(8), DecodingResult::U8(buf)) => (ColorModel::Gray, PixelData::U8(buf)),
        (ColorType::Gray(16), DecodingResult::U16(buf)) => (ColorModel::Gray, PixelData::U16(buf)),
        (ColorType::GrayA(8), DecodingResult::U8(buf)) => (ColorModel::GrayAlpha, PixelData::U8(buf)),
        (ColorType::GrayA(16), DecodingResult::U16(buf)) => (ColorModel::GrayAlpha, PixelData::U16(buf)),
        (ColorType::RGB(8), DecodingResult::U8(buf)) => (ColorModel::Rgb, PixelData::U8(buf)),
        (ColorType::RGB(16), DecodingResult::U16(buf)) => (ColorModel::Rgb, PixelData::U16(buf)),
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => (ColorModel::Rgba, PixelData::U8(buf)),
        (ColorType::RGBA(16), DecodingResult::U16(buf)) => (ColorModel::Rgba, PixelData::U16(buf)),
        (ColorType::CMYK(8), DecodingResult::U8(buf)) => (ColorModel::Cmyk, PixelData::U8(buf)),
        (ColorType::CMYK(16), DecodingResult::U16(buf)) => (ColorModel::Cmyk, PixelData::U16(buf)),
        (
            ct @ (ColorType::Gray(bits)
            | ColorType::GrayA(bits)
            | ColorType::RGB(bits)
            | ColorType::RGBA(bits)
            | ColorType::CMYK(bits)),
            _,
        ) => {
            return Err(IoError::UnsupportedBitDepth(format!("{bits}-bit samples in {ct:?}")));
        }
        (ct, _) => {
            return Err(IoError::UnsupportedFormat(format!(
                "unsupported TIFF color type: {:?}",
                ct
            )));
        }
    };

    let mut image = match data {
        PixelData::U8(d) => ImageData::from_u8(width, height, color, d)?,
        PixelData::U16(d) => ImageData::from_u16(width, height, color, d)?,
    };
    image.metadata = metadata;

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        ?color,
        bits = image.bits_per_sample(),
        "decoded TIFF"
    );
    Ok(image)
}

/// Writes an image as a single uncompressed TIFF page.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageData, options: TiffWriteOptions) -> IoResult<()> {
    write_pages(path, std::slice::from_ref(image), options)
}

/// Writes images as consecutive uncompressed pages of one TIFF file.
///
/// The embedded ICC profile and a non-default orientation are recorded
/// per page. Gray+alpha has no TIFF encoder layout and is written without
/// its alpha channel.
pub fn write_pages<P: AsRef<Path>>(path: P, images: &[ImageData], options: TiffWriteOptions) -> IoResult<()> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);

    if options.big_tiff {
        let mut encoder = TiffEncoder::new_big(file).map_err(encode_error)?;
        for image in images {
            write_image(&mut encoder, image)?;
        }
    } else {
        let mut encoder = TiffEncoder::new(file).map_err(encode_error)?;
        for image in images {
            write_image(&mut encoder, image)?;
        }
    }

    tracing::debug!(path = %path.display(), pages = images.len(), big_tiff = options.big_tiff, "wrote TIFF");
    Ok(())
}

fn write_image<W: Write + Seek, K: TiffKind>(encoder: &mut TiffEncoder<W, K>, image: &ImageData) -> IoResult<()> {
    let (w, h) = (image.width, image.height);
    let meta = &image.metadata;

    match (image.color, &image.data) {
        (ColorModel::Gray, PixelData::U8(d)) => write_page::<colortype::Gray8, _, _>(encoder, w, h, d, meta),
        (ColorModel::Gray, PixelData::U16(d)) => write_page::<colortype::Gray16, _, _>(encoder, w, h, d, meta),
        (ColorModel::Rgb, PixelData::U8(d)) => write_page::<colortype::RGB8, _, _>(encoder, w, h, d, meta),
        (ColorModel::Rgb, PixelData::U16(d)) => write_page::<colortype::RGB16, _, _>(encoder, w, h, d, meta),
        (ColorModel::Rgba, PixelData::U8(d)) => write_page::<colortype::RGBA8, _, _>(encoder, w, h, d, meta),
        (ColorModel::Rgba, PixelData::U16(d)) => write_page::<colortype::RGBA16, _, _>(encoder, w, h, d, meta),
        (ColorModel::Cmyk, PixelData::U8(d)) => write_page::<colortype::CMYK8, _, _>(encoder, w, h, d, meta),
        (ColorModel::Cmyk, PixelData::U16(d)) => write_page::<colortype::CMYK16, _, _>(encoder, w, h, d, meta),
        (ColorModel::GrayAlpha, _) => {
            tracing::warn!("dropping alpha channel: TIFF writer has no gray+alpha layout");
            write_image(encoder, &image.clone().without_alpha())
        }
    }
}

fn write_page<C, W, K>(
    encoder: &mut TiffEncoder<W, K>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    metadata: &Metadata,
) -> IoResult<()>
where
    C: EncoderColor,
    [C::Inner]: TiffValue,
    W: Write + Seek,
    K: TiffKind,
{
    let mut page = encoder.new_image::<C>(width, height).map_err(encode_error)?;

    if let Some(icc) = metadata.icc_profile.as_deref() {
        page.encoder()
            .write_tag(Tag::from_u16_exhaustive(TAG_ICC_PROFILE), UndefinedBytes(icc))
            .map_err(encode_error)?;
    }
    if metadata.orientation != Orientation::TopLeft {
        page.encoder()
            .write_tag(Tag::from_u16_exhaustive(TAG_ORIENTATION), metadata.orientation.tag())
            .map_err(encode_error)?;
    }

    page.write_data(data).map_err(encode_error)
}

/// Embeds an ICC profile in the first page of a TIFF file.
///
/// The file is edited in place without re-encoding: the profile and a copy
/// of the first IFD carrying the new tag are appended, then the header is
/// pointed at the copy. An existing profile tag is replaced. Works for
/// classic and BigTIFF in either byte order.
///
/// # Errors
///
/// Returns [`IoError::InvalidFile`] for a malformed header or IFD, and
/// [`IoError::EncodeError`] when a classic TIFF would outgrow 32-bit
/// offsets.
pub fn embed_icc_profile<F: Read + Write + Seek>(file: &mut F, icc: &[u8]) -> IoResult<()> {
    let (layout, pointer_pos) = IfdLayout::read_header(file)?;

    let mut pointer = vec![0u8; layout.offset_len()];
    file.seek(SeekFrom::Start(pointer_pos))?;
    file.read_exact(&mut pointer)?;
    let ifd_offset = layout.uint(&pointer);

    file.seek(SeekFrom::Start(ifd_offset))?;
    let mut count = vec![0u8; layout.count_len()];
    file.read_exact(&mut count)?;
    let count = layout.uint(&count);
    if count > MAX_IFD_ENTRIES {
        return Err(IoError::InvalidFile(format!("IFD with {count} entries")));
    }
    let mut raw = vec![0u8; count as usize * layout.entry_len()];
    file.read_exact(&mut raw)?;
    let mut next = vec![0u8; layout.offset_len()];
    file.read_exact(&mut next)?;

    let mut entries: Vec<&[u8]> = raw
        .chunks_exact(layout.entry_len())
        .filter(|e| layout.uint(&e[..2]) != TAG_ICC_PROFILE as u64)
        .collect();

    let mut end = file.seek(SeekFrom::End(0))?;
    end = pad_to_word(file, end)?;
    let mut icc_entry = Vec::with_capacity(layout.entry_len());
    layout.put(&mut icc_entry, TAG_ICC_PROFILE as u64, 2);
    layout.put(&mut icc_entry, TYPE_UNDEFINED as u64, 2);
    layout.put(&mut icc_entry, icc.len() as u64, layout.offset_len());
    if icc.len() <= layout.offset_len() {
        icc_entry.extend_from_slice(icc);
        icc_entry.resize(layout.entry_len(), 0);
    } else {
        layout.put(&mut icc_entry, end, layout.offset_len());
        file.write_all(icc)?;
        end = pad_to_word(file, end + icc.len() as u64)?;
    }

    let at = entries.partition_point(|e| layout.uint(&e[..2]) < TAG_ICC_PROFILE as u64);
    entries.insert(at, &icc_entry);

    let mut ifd = Vec::with_capacity(layout.count_len() + entries.len() * layout.entry_len() + next.len());
    layout.put(&mut ifd, entries.len() as u64, layout.count_len());
    entries.iter().for_each(|e| ifd.extend_from_slice(e));
    ifd.extend_from_slice(&next);

    if !layout.big_tiff && end + ifd.len() as u64 > u32::MAX as u64 {
        return Err(IoError::EncodeError("profile does not fit under 4 GiB classic TIFF offsets".into()));
    }
    file.write_all(&ifd)?;

    pointer.clear();
    layout.put(&mut pointer, end, layout.offset_len());
    file.seek(SeekFrom::Start(pointer_pos))?;
    file.write_all(&pointer)?;
    file.flush()?;

    tracing::debug!(bytes = icc.len(), ifd_offset = end, big_tiff = layout.big_tiff, "embedded ICC profile");
    Ok(())
}

/// Pads the stream to an even offset; TIFF offsets are word-aligned.
fn pad_to_word<F: Write>(file: &mut F, pos: u64) -> IoResult<u64> {
    if pos % 2 == 1 {
        file.write_all(&[0])?;
        return Ok(pos + 1);
    }
    Ok(pos)
}

/// Byte order and offset width of a TIFF file.
#[derive(Debug, Clone, Copy)]
struct IfdLayout {
    little_endian: bool,
    big_tiff: bool,
}

impl IfdLayout {
    /// Reads the header; returns the layout and the position of the first IFD pointer.
    fn read_header<F: Read + Seek>(file: &mut F) -> IoResult<(Self, u64)> {
        let mut header = [0u8; 4];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        let little_endian = match &header[..2] {
            b"II" => true,
            b"MM" => false,
            _ => return Err(IoError::InvalidFile("not a TIFF header".into())),
        };
        let classic = IfdLayout { little_endian, big_tiff: false };
        match classic.uint(&header[2..4]) {
            42 => Ok((classic, 4)),
            43 => Ok((IfdLayout { little_endian, big_tiff: true }, 8)),
            v => Err(IoError::InvalidFile(format!("unknown TIFF version {v}"))),
        }
    }

    fn offset_len(self) -> usize {
        if self.big_tiff { 8 } else { 4 }
    }

    fn count_len(self) -> usize {
        if self.big_tiff { 8 } else { 2 }
    }

    fn entry_len(self) -> usize {
        4 + 2 * self.offset_len()
    }

    fn uint(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, b: &u8| (acc << 8) | *b as u64;
        if self.little_endian {
            bytes.iter().rev().fold(0, fold)
        } else {
            bytes.iter().fold(0, fold)
        }
    }

    fn put(self, out: &mut Vec<u8>, value: u64, len: usize) {
        if self.little_endian {
            out.extend_from_slice(&value.to_le_bytes()[..len]);
        } else {
            out.extend_from_slice(&value.to_be_bytes()[8 - len..]);
        }
    }
}

/// ICC profiles are stored with field type UNDEFINED.
struct UndefinedBytes<'a>(&'a [u8]);

impl TiffValue for UndefinedBytes<'_> {
    const BYTE_LEN: u8 = 1;
    const FIELD_TYPE: Type = Type::UNDEFINED;

    fn count(&self) -> usize {
        self.0.len()
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.0)
    }
}

/// Opens a decoder without the default buffer limits.
///
/// The default 256 MiB decoding buffer rejects large 16-bit masters, and
/// also caps any tag at about 8 MiB once decoded into values.
fn open(path: &Path) -> IoResult<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited()))
}

fn tag_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> IoResult<Option<u16>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_u16()?)),
        None => Ok(None),
    }
}

fn icc_profile<R: Read + Seek>(decoder: &mut Decoder<R>) -> IoResult<Option<Vec<u8>>> {
    match decoder.find_tag(Tag::from_u16_exhaustive(TAG_ICC_PROFILE))? {
        Some(value) => {
            let bytes = value.into_u8_vec()?;
            Ok((!bytes.is_empty()).then_some(bytes))
        }
        None => Ok(None),
    }
}

fn orientation<R: Read + Seek>(decoder: &mut Decoder<R>) -> IoResult<Orientation> {
    let value = tag_u16(decoder, Tag::from_u16_exhaustive(TAG_ORIENTATION))?;
    Ok(value.and_then(Orientation::from_tag).unwrap_or_default())
}

/// Expands packed 1-bit rows (MSB first, byte-aligned) to 0/255 samples.
fn expand_bilevel(buf: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    if buf.len() == w * h {
        return buf.iter().map(|&v| if v > 0 { 255 } else { 0 }).collect();
    }

    let stride = w.div_ceil(8);
    let mut out = Vec::with_capacity(w * h);
    for row in buf.chunks(stride).take(h) {
        for x in 0..w {
            let bit = row.get(x / 8).map_or(0, |b| (b >> (7 - (x % 8))) & 1);
            out.push(if bit == 1 { 255 } else { 0 });
        }
    }
    out
}

fn encode_error(err: TiffError) -> IoError {
    match err {
        TiffError::IoError(e) => IoError::Io(e),
        other => IoError::EncodeError(other.to_string()),
    }
}
