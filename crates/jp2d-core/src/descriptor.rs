//! Read-only view over one source file.

use crate::{Jp2Error, Jp2Result};
use jp2d_io::jp2::{self, Jp2Header};
use jp2d_io::{ColorInterpretation, Format, ImageInfo};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Mimetypes accepted as conversion sources.
pub const ACCEPTED_MIMETYPES: &[&str] = &["image/tiff", "image/jpeg"];

/// Source path with its extension replaced by `.jp2`, or `.jp2` appended
/// when there is no extension.
pub fn default_jp2_path(path: &Path) -> PathBuf {
    path.with_extension("jp2")
}

/// A read-only, lazily probed view of an image file.
///
/// Header facts are read on first access and cached for the lifetime of
/// the descriptor, including a failed probe.
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_core::ImageDescriptor;
///
/// let image = ImageDescriptor::describe("/scans/page-001.tif").unwrap();
/// if image.is_candidate() {
///     println!("{}x{}", image.width().unwrap(), image.height().unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct ImageDescriptor {
    path: PathBuf,
    format: OnceLock<Format>,
    info: OnceLock<Result<ImageInfo, String>>,
    sha256: OnceLock<String>,
}

impl ImageDescriptor {
    /// Describes the file at `path`.
    ///
    /// # Errors
    ///
    /// [`Jp2Error::NotFound`] if the path does not exist or is a directory.
    pub fn describe(path: impl Into<PathBuf>) -> Jp2Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Jp2Error::NotFound { path });
        }
        tracing::trace!(path = %path.display(), "describe");
        Ok(Self {
            path,
            format: OnceLock::new(),
            info: OnceLock::new(),
            sha256: OnceLock::new(),
        })
    }

    /// Path of the described file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container format from magic bytes, falling back to the extension.
    pub fn format(&self) -> Format {
        *self
            .format
            .get_or_init(|| Format::detect(&self.path).unwrap_or(Format::Unknown))
    }

    /// MIME type of the file.
    pub fn mimetype(&self) -> &'static str {
        self.format().mime_type()
    }

    /// Returns true if the file is a JPEG 2000 image.
    pub fn is_jp2(&self) -> bool {
        self.format() == Format::Jp2
    }

    /// Returns true if the file can be converted: an accepted raster
    /// mimetype whose header is readable. JP2 files are never candidates.
    pub fn is_candidate(&self) -> bool {
        ACCEPTED_MIMETYPES.contains(&self.mimetype()) && self.info().is_ok()
    }

    /// Header facts, probed once.
    ///
    /// # Errors
    ///
    /// [`Jp2Error::Transcode`] if the header cannot be read.
    pub fn info(&self) -> Jp2Result<&ImageInfo> {
        self.info
            .get_or_init(|| jp2d_io::probe(&self.path).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| Jp2Error::Transcode(format!("{}: {}", self.path.display(), msg)))
    }

    /// Width in pixels.
    pub fn width(&self) -> Jp2Result<u32> {
        Ok(self.info()?.width)
    }

    /// Height in pixels.
    pub fn height(&self) -> Jp2Result<u32> {
        Ok(self.info()?.height)
    }

    /// Samples per pixel.
    pub fn samples_per_pixel(&self) -> Jp2Result<u16> {
        Ok(self.info()?.samples_per_pixel)
    }

    /// Bits per sample, per sample when the container lists them.
    pub fn bits_per_sample(&self) -> Jp2Result<&[u16]> {
        Ok(&self.info()?.bits_per_sample)
    }

    /// Color interpretation.
    pub fn color_interpretation(&self) -> Jp2Result<ColorInterpretation> {
        Ok(self.info()?.color)
    }

    /// Returns true if an ICC profile is embedded.
    pub fn has_icc_profile(&self) -> Jp2Result<bool> {
        Ok(self.info()?.has_icc_profile())
    }

    /// Returns true for TIFFs with more than one page. False for every
    /// other format and when the header cannot be read.
    pub fn is_multi_page(&self) -> bool {
        self.format() == Format::Tiff && self.info().is_ok_and(|info| info.is_multi_page())
    }

    /// Size of the file in bytes.
    pub fn file_size(&self) -> Jp2Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| Jp2Error::io(&self.path, e))
    }

    /// Lowercase hex SHA-256 of the file contents, computed once.
    pub fn sha256(&self) -> Jp2Result<&str> {
        if let Some(digest) = self.sha256.get() {
            return Ok(digest);
        }
        let mut file = File::open(&self.path).map_err(|e| Jp2Error::io(&self.path, e))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| Jp2Error::io(&self.path, e))?;
        let digest = format!("{:x}", hasher.finalize());
        Ok(self.sha256.get_or_init(|| digest))
    }

    /// Description of the embedded ICC profile, `None` without one.
    ///
    /// # Errors
    ///
    /// Fails if the header cannot be read or the profile is malformed.
    pub fn profile_description(&self) -> Jp2Result<Option<String>> {
        let Some(icc) = self.info()?.icc_profile.as_deref() else {
            return Ok(None);
        };
        let profile = jp2d_icc::Profile::from_icc(icc)?;
        let description = profile.description();
        Ok((!description.is_empty()).then_some(description))
    }

    /// JP2 header facts when the file is itself a JPEG 2000 image.
    pub fn jp2_header(&self) -> Jp2Result<Option<Jp2Header>> {
        if !self.is_jp2() {
            return Ok(None);
        }
        Ok(Some(jp2::read_header(&self.path)?))
    }

    /// Default output path for a derivative of this file.
    pub fn default_jp2_path(&self) -> PathBuf {
        default_jp2_path(&self.path)
    }
}
