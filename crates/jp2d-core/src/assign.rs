//! ICC profile assignment for untagged TIFF masters.

use crate::{ImageDescriptor, Jp2Error, Jp2Result, ValidationError};
use jp2d_icc::StandardProfile;
use jp2d_io::{ColorInterpretation, Format};
use std::fs::File;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Tags a TIFF with a built-in ICC profile, in place.
///
/// A source that already carries a profile is left alone unless `force`
/// is set. Pixel data is not re-encoded: the tagged copy is written to a
/// temp file beside the source and renamed over it.
///
/// Returns a fresh descriptor when the profile was written and `None`
/// when the source was skipped.
///
/// # Errors
///
/// - [`ValidationError::NotTiff`] for any non-TIFF source
/// - [`ValidationError::ProfileMismatch`] when the profile's color space
///   does not describe the stored samples
/// - [`Jp2Error::Io`] if the file cannot be copied or replaced
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_core::{ImageDescriptor, assign_profile};
/// use jp2d_icc::StandardProfile;
///
/// let scan = ImageDescriptor::describe("/scans/page-001.tif")?;
/// if let Some(tagged) = assign_profile(&scan, StandardProfile::AdobeRgb, false)? {
///     assert!(tagged.has_icc_profile()?);
/// }
/// # Ok::<(), jp2d_core::Jp2Error>(())
/// ```
pub fn assign_profile(
    source: &ImageDescriptor,
    profile: StandardProfile,
    force: bool,
) -> Jp2Result<Option<ImageDescriptor>> {
    let path = source.path();
    if source.format() != Format::Tiff {
        return Err(ValidationError::NotTiff(source.mimetype().to_string()).into());
    }
    if source.has_icc_profile()? && !force {
        tracing::debug!(path = %path.display(), "profile already embedded, skipping");
        return Ok(None);
    }

    let icc_profile = profile.to_profile()?;
    let color = source.color_interpretation()?;
    let fits = match color {
        ColorInterpretation::Srgb => icc_profile.is_rgb(),
        ColorInterpretation::Cmyk => icc_profile.is_cmyk(),
        ColorInterpretation::Grayscale => icc_profile.is_gray(),
        ColorInterpretation::Other => false,
    };
    if !fits {
        return Err(ValidationError::ProfileMismatch {
            profile: profile.to_string(),
            color: format!("{color:?}").to_lowercase(),
        }
        .into());
    }
    let icc = icc_profile.to_icc()?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Jp2Error::io(dir, e))?;
    let mut original = File::open(path).map_err(|e| Jp2Error::io(path, e))?;
    io::copy(&mut original, temp.as_file_mut()).map_err(|e| Jp2Error::io(temp.path(), e))?;
    jp2d_io::tiff::embed_icc_profile(temp.as_file_mut(), &icc)?;

    let permissions = original.metadata().map_err(|e| Jp2Error::io(path, e))?.permissions();
    temp.as_file()
        .set_permissions(permissions)
        .map_err(|e| Jp2Error::io(temp.path(), e))?;
    drop(original);
    temp.persist(path).map_err(|e| Jp2Error::io(path, e.error))?;

    tracing::info!(
        path = %path.display(),
        %profile,
        replaced = force,
        "assigned ICC profile"
    );
    ImageDescriptor::describe(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Planner, TransformKind};
    use jp2d_icc::Profile;
    use jp2d_io::tiff::{self, TiffWriteOptions};
    use jp2d_io::{ColorModel, ImageData};

    fn write_source(dir: &Path, name: &str, image: &ImageData) -> ImageDescriptor {
        let path = dir.join(name);
        tiff::write(&path, image, TiffWriteOptions::default()).unwrap();
        ImageDescriptor::describe(path).unwrap()
    }

    fn rgb(icc: Option<Vec<u8>>) -> ImageData {
        let mut image = ImageData::from_u8(6, 4, ColorModel::Rgb, (0..72).map(|v| v as u8 * 3).collect()).unwrap();
        image.metadata.icc_profile = icc;
        image
    }

    #[test]
    fn test_assigns_to_untagged() {
        let dir = tempfile::tempdir().unwrap();
        let image = rgb(None);
        let source = write_source(dir.path(), "untagged.tif", &image);
        assert_eq!(Planner::new().plan(source.info().unwrap()).transform_kind, TransformKind::None);

        let tagged = assign_profile(&source, StandardProfile::AdobeRgb, false).unwrap().unwrap();

        assert!(tagged.has_icc_profile().unwrap());
        let icc = tagged.info().unwrap().icc_profile.clone().unwrap();
        assert!(Profile::from_icc(&icc).unwrap().is_rgb());
        let plan = Planner::new().plan(tagged.info().unwrap());
        assert_eq!(plan.transform_kind, TransformKind::EmbeddedToSrgb);

        let pixels = jp2d_io::read(tagged.path()).unwrap();
        assert_eq!(pixels.data, image.data);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_existing_profile_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let srgb = Profile::srgb().to_icc().unwrap();
        let source = write_source(dir.path(), "tagged.tif", &rgb(Some(srgb)));
        let before = std::fs::read(source.path()).unwrap();

        assert!(assign_profile(&source, StandardProfile::AdobeRgb, false).unwrap().is_none());
        assert_eq!(std::fs::read(source.path()).unwrap(), before);
    }

    #[test]
    fn test_force_replaces_profile() {
        let dir = tempfile::tempdir().unwrap();
        let marker = vec![0xAB; 256];
        let source = write_source(dir.path(), "tagged.tif", &rgb(Some(marker.clone())));

        let tagged = assign_profile(&source, StandardProfile::Srgb, true).unwrap().unwrap();

        let icc = tagged.info().unwrap().icc_profile.clone().unwrap();
        assert_ne!(icc, marker);
        assert!(Profile::from_icc(&icc).unwrap().is_rgb());
    }

    #[test]
    fn test_gray_and_cmyk_sources() {
        let dir = tempfile::tempdir().unwrap();
        let gray = ImageData::from_u8(2, 2, ColorModel::Gray, vec![0, 60, 120, 240]).unwrap();
        let source = write_source(dir.path(), "gray.tif", &gray);
        let tagged = assign_profile(&source, StandardProfile::Gray22, false).unwrap().unwrap();
        assert!(tagged.has_icc_profile().unwrap());

        let cmyk = ImageData::from_u8(1, 1, ColorModel::Cmyk, vec![10, 20, 30, 40]).unwrap();
        let source = write_source(dir.path(), "cmyk.tif", &cmyk);
        let tagged = assign_profile(&source, StandardProfile::GenericCmyk, false).unwrap().unwrap();
        let icc = tagged.info().unwrap().icc_profile.clone().unwrap();
        assert!(Profile::from_icc(&icc).unwrap().is_cmyk());
    }

    #[test]
    fn test_rejects_mismatched_profile() {
        let dir = tempfile::tempdir().unwrap();
        let gray = ImageData::from_u8(2, 1, ColorModel::Gray, vec![0, 255]).unwrap();
        let source = write_source(dir.path(), "gray.tif", &gray);
        let before = std::fs::read(source.path()).unwrap();

        let err = assign_profile(&source, StandardProfile::DisplayP3, false).unwrap_err();
        assert!(matches!(
            err,
            Jp2Error::Validation(ValidationError::ProfileMismatch { ref profile, ref color })
                if profile == "display-p3" && color == "grayscale"
        ));
        assert_eq!(std::fs::read(source.path()).unwrap(), before);
    }

    #[test]
    fn test_rejects_non_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).unwrap();
        let source = ImageDescriptor::describe(&path).unwrap();

        let err = assign_profile(&source, StandardProfile::Srgb, true).unwrap_err();
        assert!(matches!(err, Jp2Error::Validation(ValidationError::NotTiff(_))));
    }
}
