//! ICC profile wrapper.

use crate::{IccError, IccResult, StandardProfile};
use jp2d_io::ColorModel;
use lcms2::{ColorSpaceSignature, Profile as LcmsProfile};
use std::path::Path;

/// An ICC color profile.
///
/// Profiles come from files (a configured CMYK press profile), from bytes
/// embedded in a source image, or from a [`StandardProfile`].
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_icc::Profile;
/// use std::path::Path;
///
/// let cmyk = Profile::from_file(Path::new("USWebCoatedSWOP.icc")).unwrap();
/// assert!(cmyk.is_cmyk());
/// println!("{}", cmyk.description());
/// ```
pub struct Profile {
    pub(crate) inner: LcmsProfile,
}

impl Profile {
    /// Loads a profile from an ICC file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid data.
    pub fn from_file(path: &Path) -> IccResult<Self> {
        let inner = LcmsProfile::new_file(path)
            .map_err(|e| IccError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Self { inner })
    }

    /// Creates a profile from raw ICC data.
    pub fn from_icc(data: &[u8]) -> IccResult<Self> {
        let inner = LcmsProfile::new_icc(data).map_err(|e| IccError::InvalidProfile(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Creates an sRGB profile (IEC 61966-2-1).
    pub fn srgb() -> Self {
        Self {
            inner: LcmsProfile::new_srgb(),
        }
    }

    /// Creates one of the built-in profiles.
    pub fn from_standard(standard: StandardProfile) -> IccResult<Self> {
        standard.to_profile()
    }

    /// Creates a D50 grayscale profile with the specified gamma.
    pub fn gray(gamma: f64) -> IccResult<Self> {
        let curve = lcms2::ToneCurve::new(gamma);
        let inner = LcmsProfile::new_gray(&lcms2::CIExyY::d50(), &curve)
            .map_err(|e| IccError::CreateFailed(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Returns the profile description (`desc` tag), empty if absent.
    pub fn description(&self) -> String {
        self.inner
            .info(lcms2::InfoType::Description, lcms2::Locale::none())
            .unwrap_or_default()
    }

    /// Returns the color space signature.
    pub fn color_space(&self) -> String {
        format!("{:?}", self.inner.color_space())
    }

    /// Returns true if this is an RGB profile.
    pub fn is_rgb(&self) -> bool {
        matches!(self.inner.color_space(), ColorSpaceSignature::RgbData)
    }

    /// Returns true if this is a CMYK profile.
    pub fn is_cmyk(&self) -> bool {
        matches!(self.inner.color_space(), ColorSpaceSignature::CmykData)
    }

    /// Returns true if this is a grayscale profile.
    pub fn is_gray(&self) -> bool {
        matches!(self.inner.color_space(), ColorSpaceSignature::GrayData)
    }

    /// Returns true if the profile can describe pixels of `model`.
    pub fn accepts(&self, model: ColorModel) -> bool {
        match model {
            ColorModel::Gray | ColorModel::GrayAlpha => self.is_gray(),
            ColorModel::Rgb | ColorModel::Rgba => self.is_rgb(),
            ColorModel::Cmyk => self.is_cmyk(),
        }
    }

    /// Exports the profile as ICC data.
    pub fn to_icc(&self) -> IccResult<Vec<u8>> {
        self.inner.icc().map_err(|e| IccError::CreateFailed(e.to_string()))
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("description", &self.description())
            .field("color_space", &self.color_space())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb() {
        let profile = Profile::srgb();
        assert!(profile.is_rgb());
        assert!(profile.accepts(ColorModel::Rgba));
        assert!(!profile.accepts(ColorModel::Cmyk));
        assert!(!profile.description().is_empty());
    }

    #[test]
    fn test_gray() {
        let profile = Profile::gray(2.2).unwrap();
        assert!(profile.is_gray());
        assert!(profile.accepts(ColorModel::GrayAlpha));
    }

    #[test]
    fn test_to_icc_roundtrip() {
        let data = Profile::srgb().to_icc().unwrap();
        assert!(!data.is_empty());
        let reloaded = Profile::from_icc(&data).unwrap();
        assert!(reloaded.is_rgb());
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(matches!(Profile::from_icc(b"not a profile"), Err(IccError::InvalidProfile(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Profile::from_file(Path::new("/nonexistent/press.icc")).unwrap_err();
        assert!(matches!(err, IccError::LoadFailed(_)));
    }
}
