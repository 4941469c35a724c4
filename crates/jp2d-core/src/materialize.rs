//! Intermediate TIFF materialization.
//!
//! Loads the source, applies the planned color transform and writes an
//! uncompressed TIFF into a uniquely named temp file. The temp file is a
//! [`TempArtifact`]: it is removed when dropped unless explicitly kept.

use crate::config::ColorConfig;
use crate::plan::{ConversionPlan, TransformKind};
use crate::{ImageDescriptor, Jp2Error, Jp2Result};
use jp2d_icc::{Profile, StandardProfile, convert_to_srgb};
use jp2d_io::tiff::{self, TiffWriteOptions};
use jp2d_io::{ColorModel, ImageData};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const TEMP_PREFIX: &str = "jp2d-";
const TEMP_SUFFIX: &str = ".tif";

/// Loads, color converts and writes rasters.
///
/// The default implementation is [`LcmsTranscoder`]; tests substitute
/// their own to force failures.
pub trait RasterTranscoder: Send + Sync {
    /// Loads page 0 of `source`, rotated upright.
    fn load(&self, source: &Path) -> Jp2Result<ImageData>;

    /// Applies the color transform selected by the plan.
    fn convert(&self, image: ImageData, kind: TransformKind) -> Jp2Result<ImageData>;

    /// Writes an uncompressed TIFF.
    fn write_tiff(&self, image: &ImageData, dest: &Path, big_tiff: bool) -> Jp2Result<()>;
}

/// Transcoder backed by `jp2d-io` codecs and Little CMS.
#[derive(Debug, Clone, Default)]
pub struct LcmsTranscoder {
    color: ColorConfig,
}

impl LcmsTranscoder {
    /// Creates a transcoder with the given color settings.
    pub fn new(color: ColorConfig) -> Self {
        Self { color }
    }

    /// Source profile for CMYK pixels: the configured profile, else a CMYK
    /// profile embedded in the image, else the built-in generic CMYK.
    fn cmyk_profile(&self, image: &ImageData) -> Jp2Result<Profile> {
        if let Some(path) = &self.color.cmyk_profile {
            return Ok(Profile::from_file(path)?);
        }
        if let Some(icc) = image.metadata.icc_profile.as_deref() {
            let embedded = Profile::from_icc(icc)?;
            if embedded.is_cmyk() {
                return Ok(embedded);
            }
        }
        Ok(StandardProfile::GenericCmyk.to_profile()?)
    }
}

impl RasterTranscoder for LcmsTranscoder {
    fn load(&self, source: &Path) -> Jp2Result<ImageData> {
        Ok(jp2d_io::read(source)?)
    }

    fn convert(&self, image: ImageData, kind: TransformKind) -> Jp2Result<ImageData> {
        match kind {
            TransformKind::None => Ok(image),
            TransformKind::CmykToSrgb => {
                let profile = self.cmyk_profile(&image)?;
                tracing::debug!(profile = %profile.description(), "CMYK to sRGB");
                Ok(convert_to_srgb(&image, &profile, self.color.intent)?)
            }
            TransformKind::EmbeddedToSrgb => {
                let icc = image
                    .metadata
                    .icc_profile
                    .as_deref()
                    .ok_or_else(|| Jp2Error::Transcode("source has no embedded profile".into()))?;
                let profile = Profile::from_icc(icc)?;
                Ok(convert_to_srgb(&image, &profile, self.color.intent)?)
            }
        }
    }

    fn write_tiff(&self, image: &ImageData, dest: &Path, big_tiff: bool) -> Jp2Result<()> {
        Ok(tiff::write(dest, image, TiffWriteOptions { big_tiff })?)
    }
}

/// A normalized intermediate TIFF on disk.
///
/// The file is deleted when the artifact is dropped or closed; [`keep`]
/// detaches it.
///
/// [`keep`]: TempArtifact::keep
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
    width: u32,
    height: u32,
    color: ColorModel,
}

impl TempArtifact {
    /// Location of the intermediate TIFF.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Width of the written raster.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the written raster.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout of the written raster.
    pub fn color(&self) -> ColorModel {
        self.color
    }

    /// Returns true for a three-component RGB raster.
    pub fn is_srgb(&self) -> bool {
        self.color == ColorModel::Rgb
    }

    /// Keeps the file on disk and returns its path.
    pub fn keep(self) -> Jp2Result<PathBuf> {
        self.path.keep().map_err(|e| Jp2Error::io(e.path.to_path_buf(), e.error))
    }

    /// Deletes the file now, surfacing deletion errors.
    pub fn close(self) -> Jp2Result<()> {
        let path = self.path.to_path_buf();
        self.path.close().map_err(|e| Jp2Error::io(path, e))
    }
}

/// Produces [`TempArtifact`]s through a [`RasterTranscoder`].
#[derive(Clone, Copy)]
pub struct Materializer<'a> {
    transcoder: &'a dyn RasterTranscoder,
}

impl<'a> Materializer<'a> {
    /// Creates a materializer over `transcoder`.
    pub fn new(transcoder: &'a dyn RasterTranscoder) -> Self {
        Self { transcoder }
    }

    /// Writes the normalized intermediate for `source` into `tmp_dir`.
    ///
    /// Creates exactly one new file and never touches the source. On any
    /// failure the temp file is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// [`Jp2Error::Io`] if `tmp_dir` does not exist or the temp file cannot
    /// be created, [`Jp2Error::Transcode`] if loading, converting or
    /// writing fails or the source no longer matches the plan.
    pub fn materialize(
        &self,
        source: &ImageDescriptor,
        plan: &ConversionPlan,
        tmp_dir: &Path,
    ) -> Jp2Result<TempArtifact> {
        if !tmp_dir.is_dir() {
            return Err(Jp2Error::io(
                tmp_dir,
                io::Error::new(io::ErrorKind::NotFound, "tmp_folder does not exist"),
            ));
        }

        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(tmp_dir)
            .map_err(|e| Jp2Error::io(tmp_dir, e))?
            .into_temp_path();
        tracing::debug!(tmp = %path.display(), "created temp artifact");

        let image = self.transcoder.load(source.path())?;
        let dims = (image.width, image.height);
        let planned = (plan.source_width, plan.source_height);
        if dims != planned && dims != (planned.1, planned.0) {
            return Err(Jp2Error::Transcode(format!(
                "{} is {}x{} but was planned as {}x{}",
                source.path().display(),
                dims.0,
                dims.1,
                planned.0,
                planned.1
            )));
        }

        let mut image = self.transcoder.convert(image, plan.transform_kind)?;
        if image.color == ColorModel::GrayAlpha {
            tracing::warn!(path = %source.path().display(), "dropping gray alpha channel");
            image = image.without_alpha();
        }

        self.transcoder.write_tiff(&image, &path, plan.needs_big_tiff)?;

        Ok(TempArtifact {
            path,
            width: image.width,
            height: image.height,
            color: image.color,
        })
    }
}
