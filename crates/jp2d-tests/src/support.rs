//! Fixture writers and an in-process stand-in for the JP2 encoder.

use jp2d_core::{EncoderCommand, ProcessOutput, ProcessRunner};
use jp2d_io::tiff::{self, TiffWriteOptions};
use jp2d_io::{ColorInterpretation, ColorModel, ImageData, ImageInfo};
use jpeg_encoder::{ColorType, Encoder};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const JP2_SIGNATURE: [u8; 12] = [0, 0, 0, 12, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A];

/// Horizontal gradient with `channels` samples per pixel.
pub fn gradient(width: u32, height: u32, channels: usize) -> Vec<u8> {
    (0..height)
        .flat_map(|_| (0..width).map(move |x| (x * 255 / width.max(1)) as u8))
        .flat_map(|v| std::iter::repeat_n(v, channels))
        .collect()
}

/// Writes a classic TIFF.
pub fn write_tiff(path: &Path, image: &ImageData) {
    tiff::write(path, image, TiffWriteOptions { big_tiff: false }).unwrap();
}

/// Writes an 8-bit RGB TIFF without an ICC profile.
pub fn rgb_tiff(path: &Path, width: u32, height: u32) {
    let image = ImageData::from_u8(width, height, ColorModel::Rgb, gradient(width, height, 3)).unwrap();
    write_tiff(path, &image);
}

/// Writes an 8-bit CMYK TIFF without an ICC profile.
pub fn cmyk_tiff(path: &Path, width: u32, height: u32) {
    let image = ImageData::from_u8(width, height, ColorModel::Cmyk, gradient(width, height, 4)).unwrap();
    write_tiff(path, &image);
}

/// Writes a 16-bit grayscale TIFF.
pub fn gray_tiff(path: &Path, width: u32, height: u32) {
    let samples = (0..width * height).map(|i| (i * 97 % 65536) as u16).collect();
    let image = ImageData::from_u16(width, height, ColorModel::Gray, samples).unwrap();
    write_tiff(path, &image);
}

/// Writes an LZW-compressed 8-bit RGB TIFF.
pub fn lzw_rgb_tiff(path: &Path, width: u32, height: u32) {
    use ::tiff::encoder::{Compression, TiffEncoder, colortype};

    let file = std::io::BufWriter::new(std::fs::File::create(path).unwrap());
    let mut encoder = TiffEncoder::new(file).unwrap().with_compression(Compression::Lzw);
    encoder
        .write_image::<colortype::RGB8>(width, height, &gradient(width, height, 3))
        .unwrap();
}

/// Writes a 1-bit WhiteIsZero TIFF, the usual layout of bitonal scans.
///
/// The left half of every row is inked (black), the right half is paper.
pub fn bitonal_tiff(path: &Path, width: u32, height: u32) {
    let stride = width.div_ceil(8) as usize;
    let mut rows = vec![0u8; stride * height as usize];
    for row in rows.chunks_mut(stride) {
        for x in 0..(width / 2) as usize {
            row[x / 8] |= 0x80 >> (x % 8);
        }
    }

    let entries: [(u16, u16, u32); 9] = [
        (256, 4, width),
        (257, 4, height),
        (258, 3, 1),
        (259, 3, 1),
        (262, 3, 0),
        (273, 4, 8 + 2 + 9 * 12 + 4),
        (277, 3, 1),
        (278, 4, height),
        (279, 4, rows.len() as u32),
    ];
    let mut out = b"II*\0\x08\0\0\0".to_vec();
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&rows);
    std::fs::write(path, out).unwrap();
}

/// Writes a baseline RGB JPEG, optionally tagged with an EXIF orientation.
pub fn rgb_jpeg(path: &Path, width: u16, height: u16, orientation: Option<u16>) {
    let mut encoder = Encoder::new_file(path, 90).unwrap();
    if let Some(orientation) = orientation {
        encoder.add_app_segment(1, &exif_orientation(orientation)).unwrap();
    }
    let data = gradient(u32::from(width), u32::from(height), 3);
    encoder.encode(&data, width, height, ColorType::Rgb).unwrap();
}

/// Big-endian EXIF block holding only IFD0 tag 0x0112.
fn exif_orientation(value: u16) -> Vec<u8> {
    let mut out = b"Exif\0\0MM\0\x2a\0\0\0\x08".to_vec();
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0x0112u16.to_be_bytes());
    out.extend_from_slice(&3u16.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&value.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    out
}

fn boxed(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

/// Minimal JP2: signature, ftyp, jp2h (ihdr + optional enumerated colr)
/// and a codestream carrying SIZ and COD.
pub fn jp2_bytes(width: u32, height: u32, components: u16, color_space: Option<u32>, layers: u16) -> Vec<u8> {
    let mut ihdr = height.to_be_bytes().to_vec();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&components.to_be_bytes());
    ihdr.extend_from_slice(&[7, 7, 0, 0]);

    let mut jp2h = boxed(b"ihdr", &ihdr);
    if let Some(space) = color_space {
        let mut colr = vec![1, 0, 0];
        colr.extend_from_slice(&space.to_be_bytes());
        jp2h.extend(boxed(b"colr", &colr));
    }

    let mut siz = vec![0, 0];
    for v in [width, height, 0, 0, width, height, 0, 0] {
        siz.extend_from_slice(&v.to_be_bytes());
    }
    siz.extend_from_slice(&components.to_be_bytes());
    for _ in 0..components {
        siz.extend_from_slice(&[7, 1, 1]);
    }
    let mut cs = vec![0xFF, 0x4F, 0xFF, 0x51];
    cs.extend_from_slice(&((siz.len() + 2) as u16).to_be_bytes());
    cs.extend_from_slice(&siz);
    let mut cod = vec![0, 0x04];
    cod.extend_from_slice(&layers.to_be_bytes());
    cod.extend_from_slice(&[1, 5, 4, 4, 0, 0]);
    cs.extend_from_slice(&[0xFF, 0x52]);
    cs.extend_from_slice(&((cod.len() + 2) as u16).to_be_bytes());
    cs.extend_from_slice(&cod);
    cs.extend_from_slice(&[0xFF, 0xD9]);

    let mut out = JP2_SIGNATURE.to_vec();
    out.extend(boxed(b"ftyp", b"jp2 \0\0\0\0jp2 "));
    out.extend(boxed(b"jp2h", &jp2h));
    out.extend(boxed(b"jp2c", &cs));
    out
}

/// One observed encoder run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Command as received.
    pub command: EncoderCommand,
    /// Header of the intermediate TIFF at the time of the run.
    pub input: ImageInfo,
}

impl Invocation {
    pub fn input_path(&self) -> PathBuf {
        PathBuf::from(self.command.arg_after("-i").unwrap())
    }

    pub fn layers(&self) -> u32 {
        self.command
            .args()
            .iter()
            .find_map(|a| a.to_str()?.strip_prefix("Clayers=")?.parse().ok())
            .unwrap()
    }

    pub fn srgb_flag(&self) -> bool {
        self.command.has_arg("-jp2_space") && self.command.arg_after("-jp2_space").unwrap() == "sRGB"
    }
}

/// Stand-in for `kdu_compress`.
///
/// Reads the intermediate TIFF header and writes a JP2 whose header
/// reflects the arguments. In failing mode it leaves a truncated output
/// and exits 1, the way a crashed encoder would.
#[derive(Clone, Default)]
pub struct FakeEncoder {
    fail: bool,
    runs: Arc<Mutex<Vec<Invocation>>>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<Invocation> {
        self.runs.lock().unwrap().clone()
    }

    pub fn last(&self) -> Invocation {
        self.runs().pop().unwrap()
    }
}

impl ProcessRunner for FakeEncoder {
    fn run(&self, command: &EncoderCommand) -> io::Result<ProcessOutput> {
        let input = PathBuf::from(command.arg_after("-i").unwrap_or_default());
        let output = PathBuf::from(command.arg_after("-o").unwrap_or_default());

        let info = match jp2d_io::probe(&input) {
            Ok(info) => info,
            Err(e) => {
                return Ok(ProcessOutput {
                    status: Some(1),
                    output: format!("Kakadu Error: cannot open input: {e}"),
                });
            }
        };

        let invocation = Invocation {
            command: command.clone(),
            input: info.clone(),
        };
        let layers = invocation.layers() as u16;
        let srgb = invocation.srgb_flag();
        self.runs.lock().unwrap().push(invocation);

        if self.fail {
            std::fs::write(&output, &JP2_SIGNATURE[..8])?;
            return Ok(ProcessOutput {
                status: Some(1),
                output: "Kakadu Core Error: simulated failure".into(),
            });
        }

        let space = match (srgb, info.color) {
            (true, _) => Some(16),
            (false, ColorInterpretation::Grayscale) => Some(17),
            _ => None,
        };
        let bytes = jp2_bytes(info.width, info.height, info.samples_per_pixel, space, layers);
        std::fs::write(&output, bytes)?;
        Ok(ProcessOutput {
            status: Some(0),
            output: String::new(),
        })
    }
}

/// Files in `dir` whose names start with the intermediate TIFF prefix.
pub fn temp_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("jp2d-") && n.ends_with(".tif"))
        })
        .collect()
}
