//! Color transforms from a source profile to sRGB.

use crate::{IccError, IccResult, Intent, Profile};
use jp2d_io::{ColorModel, ImageData, Metadata, PixelData};
use lcms2::{PixelFormat, Pod, Transform as LcmsTransform};

/// A transform from a source profile to sRGB for one pixel layout.
///
/// The source layout decides the lcms2 input format; the output is always
/// three-channel RGB at the same bit depth. Alpha bypasses color
/// management and is re-attached unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_icc::{Intent, Profile, StandardProfile, Transform};
/// use jp2d_io::ColorModel;
///
/// let adobe = StandardProfile::AdobeRgb.to_profile().unwrap();
/// let transform = Transform::to_srgb(&adobe, ColorModel::Rgb, 8, Intent::Perceptual).unwrap();
/// ```
pub struct Transform {
    kernel: Kernel,
    source: ColorModel,
}

enum Kernel {
    Gray8(LcmsTransform<u8, [u8; 3]>),
    Rgb8(LcmsTransform<[u8; 3], [u8; 3]>),
    Cmyk8(LcmsTransform<[u8; 4], [u8; 3]>),
    Gray16(LcmsTransform<u16, [u16; 3]>),
    Rgb16(LcmsTransform<[u16; 3], [u16; 3]>),
    Cmyk16(LcmsTransform<[u16; 4], [u16; 3]>),
}

impl Transform {
    /// Creates a transform from `source` to sRGB for pixels of `model`
    /// at `bits` per sample.
    ///
    /// # Errors
    ///
    /// [`IccError::ColorSpaceMismatch`] if the profile cannot describe the
    /// layout, [`IccError::TransformFailed`] if lcms2 rejects the pair.
    pub fn to_srgb(source: &Profile, model: ColorModel, bits: u16, intent: Intent) -> IccResult<Self> {
        if !source.accepts(model) {
            return Err(IccError::ColorSpaceMismatch {
                expected: format!("{:?}", model),
                actual: source.color_space(),
            });
        }

        let srgb = Profile::srgb();
        let dst = &srgb.inner;
        let src = &source.inner;
        let intent: lcms2::Intent = intent.into();
        let failed = |e: lcms2::Error| IccError::TransformFailed(e.to_string());

        let kernel = match (model, bits) {
            (ColorModel::Gray | ColorModel::GrayAlpha, 8) => Kernel::Gray8(
                LcmsTransform::new(src, PixelFormat::GRAY_8, dst, PixelFormat::RGB_8, intent)
                    .map_err(failed)?,
            ),
            (ColorModel::Rgb | ColorModel::Rgba, 8) => Kernel::Rgb8(
                LcmsTransform::new(src, PixelFormat::RGB_8, dst, PixelFormat::RGB_8, intent)
                    .map_err(failed)?,
            ),
            (ColorModel::Cmyk, 8) => Kernel::Cmyk8(
                LcmsTransform::new(src, PixelFormat::CMYK_8, dst, PixelFormat::RGB_8, intent)
                    .map_err(failed)?,
            ),
            (ColorModel::Gray | ColorModel::GrayAlpha, 16) => Kernel::Gray16(
                LcmsTransform::new(src, PixelFormat::GRAY_16, dst, PixelFormat::RGB_16, intent)
                    .map_err(failed)?,
            ),
            (ColorModel::Rgb | ColorModel::Rgba, 16) => Kernel::Rgb16(
                LcmsTransform::new(src, PixelFormat::RGB_16, dst, PixelFormat::RGB_16, intent)
                    .map_err(failed)?,
            ),
            (ColorModel::Cmyk, 16) => Kernel::Cmyk16(
                LcmsTransform::new(src, PixelFormat::CMYK_16, dst, PixelFormat::RGB_16, intent)
                    .map_err(failed)?,
            ),
            (_, other) => {
                return Err(IccError::TransformFailed(format!("unsupported bit depth: {}", other)));
            }
        };

        Ok(Self { kernel, source: model })
    }

    /// Converts an image to sRGB, tagging the result with the sRGB profile.
    ///
    /// # Errors
    ///
    /// Fails if the image layout differs from the one the transform was
    /// built for.
    pub fn apply(&self, image: &ImageData) -> IccResult<ImageData> {
        let mismatch = || IccError::ColorSpaceMismatch {
            expected: format!("{:?} {}-bit", self.source, self.bits()),
            actual: format!("{:?} {}-bit", image.color, image.bits_per_sample()),
        };
        if image.color != self.source {
            return Err(mismatch());
        }

        let channels = image.channels();
        let color_channels = image.color.color_channels();
        let has_alpha = image.color.has_alpha();

        let data = match (&self.kernel, &image.data) {
            (Kernel::Gray8(t), PixelData::U8(d)) => {
                let src: Vec<u8> = d.iter().step_by(channels).copied().collect();
                PixelData::U8(finish(d, run(t, &src), channels, has_alpha))
            }
            (Kernel::Rgb8(t), PixelData::U8(d)) => {
                let src: Vec<[u8; 3]> = d.chunks_exact(channels).map(|p| [p[0], p[1], p[2]]).collect();
                PixelData::U8(finish(d, run(t, &src), channels, has_alpha))
            }
            (Kernel::Cmyk8(t), PixelData::U8(d)) => {
                let src: Vec<[u8; 4]> = d.chunks_exact(color_channels).map(|p| [p[0], p[1], p[2], p[3]]).collect();
                PixelData::U8(finish(d, run(t, &src), channels, false))
            }
            (Kernel::Gray16(t), PixelData::U16(d)) => {
                let src: Vec<u16> = d.iter().step_by(channels).copied().collect();
                PixelData::U16(finish(d, run(t, &src), channels, has_alpha))
            }
            (Kernel::Rgb16(t), PixelData::U16(d)) => {
                let src: Vec<[u16; 3]> = d.chunks_exact(channels).map(|p| [p[0], p[1], p[2]]).collect();
                PixelData::U16(finish(d, run(t, &src), channels, has_alpha))
            }
            (Kernel::Cmyk16(t), PixelData::U16(d)) => {
                let src: Vec<[u16; 4]> = d.chunks_exact(color_channels).map(|p| [p[0], p[1], p[2], p[3]]).collect();
                PixelData::U16(finish(d, run(t, &src), channels, false))
            }
            _ => return Err(mismatch()),
        };

        Ok(ImageData {
            width: image.width,
            height: image.height,
            color: if has_alpha { ColorModel::Rgba } else { ColorModel::Rgb },
            data,
            metadata: Metadata {
                icc_profile: Some(Profile::srgb().to_icc()?),
                orientation: image.metadata.orientation,
            },
        })
    }

    fn bits(&self) -> u16 {
        match self.kernel {
            Kernel::Gray8(_) | Kernel::Rgb8(_) | Kernel::Cmyk8(_) => 8,
            _ => 16,
        }
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("source", &self.source)
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

fn run<I: Pod, O: Pod + Default>(transform: &LcmsTransform<I, O>, src: &[I]) -> Vec<O> {
    let mut dst = vec![O::default(); src.len()];
    transform.transform_pixels(src, &mut dst);
    dst
}

/// Flattens RGB output, re-attaching the source alpha when present.
fn finish<T: Copy>(source: &[T], rgb: Vec<[T; 3]>, channels: usize, has_alpha: bool) -> Vec<T> {
    if !has_alpha {
        return rgb.into_iter().flatten().collect();
    }
    let mut out = Vec::with_capacity(rgb.len() * 4);
    for (px, src) in rgb.iter().zip(source.chunks_exact(channels)) {
        out.extend_from_slice(px);
        out.push(src[channels - 1]);
    }
    out
}

/// Converts an image from `source` to sRGB.
///
/// Builds a [`Transform`] for the image's layout and applies it once.
pub fn convert_to_srgb(image: &ImageData, source: &Profile, intent: Intent) -> IccResult<ImageData> {
    tracing::debug!(
        source = %source.description(),
        color = ?image.color,
        bits = image.bits_per_sample(),
        "ICC transform to sRGB"
    );
    let transform = Transform::to_srgb(source, image.color, image.bits_per_sample(), intent)?;
    transform.apply(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StandardProfile;

    #[test]
    fn test_identity_rgb8() {
        let image = ImageData::from_u8(2, 1, ColorModel::Rgb, vec![200, 100, 50, 10, 20, 30]).unwrap();
        let out = convert_to_srgb(&image, &Profile::srgb(), Intent::Perceptual).unwrap();

        assert_eq!(out.color, ColorModel::Rgb);
        let PixelData::U8(d) = &out.data else { panic!("expected u8") };
        for (a, b) in d.iter().zip([200u8, 100, 50, 10, 20, 30]) {
            assert!((*a as i32 - b as i32).abs() <= 1, "{} vs {}", a, b);
        }
        assert!(out.metadata.icc_profile.is_some());
    }

    #[test]
    fn test_adobe_rgb_changes_saturated_green() {
        let adobe = StandardProfile::AdobeRgb.to_profile().unwrap();
        let image = ImageData::from_u16(1, 1, ColorModel::Rgb, vec![0, 65535, 0]).unwrap();
        let out = convert_to_srgb(&image, &adobe, Intent::RelativeColorimetric).unwrap();

        let PixelData::U16(d) = &out.data else { panic!("expected u16") };
        // Adobe RGB green lies outside sRGB: red clips to zero, green saturates
        assert!(d[1] > 60000);
        assert_eq!(out.bits_per_sample(), 16);
    }

    #[test]
    fn test_alpha_preserved() {
        let image = ImageData::from_u8(2, 1, ColorModel::Rgba, vec![10, 20, 30, 77, 40, 50, 60, 200]).unwrap();
        let out = convert_to_srgb(&image, &Profile::srgb(), Intent::Perceptual).unwrap();
        assert_eq!(out.color, ColorModel::Rgba);
        let PixelData::U8(d) = &out.data else { panic!("expected u8") };
        assert_eq!(d.len(), 8);
        assert_eq!((d[3], d[7]), (77, 200));
    }

    fn close(actual: &[u8], expected: [u8; 3]) -> bool {
        actual.iter().zip(expected).all(|(&a, e)| (a as i32 - e as i32).abs() <= 2)
    }

    #[test]
    fn test_generic_cmyk_to_srgb() {
        // Reference values from LittleCMS (perceptual, 8-bit)
        let cases: [([u8; 4], [u8; 3]); 6] = [
            ([0, 0, 0, 0], [255, 255, 255]),
            ([255, 0, 0, 0], [0, 151, 218]),
            ([0, 255, 0, 0], [216, 0, 122]),
            ([0, 0, 255, 0], [239, 224, 0]),
            ([0, 0, 0, 255], [41, 41, 41]),
            ([128, 64, 32, 16], [166, 171, 192]),
        ];
        let cmyk = StandardProfile::GenericCmyk.to_profile().unwrap();
        let pixels: Vec<u8> = cases.iter().flat_map(|(c, _)| *c).collect();
        let image = ImageData::from_u8(cases.len() as u32, 1, ColorModel::Cmyk, pixels).unwrap();
        let out = convert_to_srgb(&image, &cmyk, Intent::Perceptual).unwrap();

        assert_eq!(out.color, ColorModel::Rgb);
        let PixelData::U8(d) = &out.data else { panic!("expected u8") };
        for ((cmyk, rgb), px) in cases.iter().zip(d.chunks_exact(3)) {
            assert!(close(px, *rgb), "{cmyk:?} -> {px:?}, expected {rgb:?}");
        }
    }

    #[test]
    fn test_generic_cmyk_16bit() {
        let cmyk = StandardProfile::GenericCmyk.to_profile().unwrap();
        let image = ImageData::from_u16(2, 1, ColorModel::Cmyk, vec![0, 0, 0, 0, 65535, 0, 0, 0]).unwrap();
        let out = convert_to_srgb(&image, &cmyk, Intent::Perceptual).unwrap();

        let PixelData::U16(d) = &out.data else { panic!("expected u16") };
        assert!(d[..3].iter().all(|&v| v > 65000));
        assert!(d[3] < 600);
        assert!((d[4] as i32 - 38702).abs() < 600);
        assert!((d[5] as i32 - 55993).abs() < 600);
    }

    #[test]
    fn test_gray_to_rgb() {
        let gray = Profile::gray(2.2).unwrap();
        let image = ImageData::from_u8(3, 1, ColorModel::Gray, vec![0, 128, 255]).unwrap();
        let out = convert_to_srgb(&image, &gray, Intent::Perceptual).unwrap();

        assert_eq!(out.color, ColorModel::Rgb);
        let PixelData::U8(d) = &out.data else { panic!("expected u8") };
        // Neutral in, neutral out
        for px in d.chunks_exact(3) {
            assert!((px[0] as i32 - px[2] as i32).abs() <= 2);
        }
        assert!(d[0] < 5 && d[6] > 250);
    }

    #[test]
    fn test_profile_mismatch() {
        let image = ImageData::from_u8(1, 1, ColorModel::Cmyk, vec![0, 0, 0, 0]).unwrap();
        let err = convert_to_srgb(&image, &Profile::srgb(), Intent::Perceptual).unwrap_err();
        assert!(matches!(err, IccError::ColorSpaceMismatch { .. }));
    }

    #[test]
    fn test_apply_rejects_other_layout() {
        let transform = Transform::to_srgb(&Profile::srgb(), ColorModel::Rgb, 8, Intent::Perceptual).unwrap();
        let image = ImageData::from_u16(1, 1, ColorModel::Rgb, vec![1, 2, 3]).unwrap();
        assert!(transform.apply(&image).is_err());
    }
}
