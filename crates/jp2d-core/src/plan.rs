//! Normalization planning.
//!
//! Decides, from header facts alone, how a source is funneled into the
//! uncompressed sRGB (or gray) TIFF the encoder consumes.

use jp2d_io::{ColorInterpretation, ImageInfo};
use serde::Serialize;

/// Largest uncompressed size a classic TIFF can address.
pub const CLASSIC_TIFF_LIMIT: u64 = 1 << 32;

/// Color transform applied while materializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Pixels pass through unchanged.
    None,
    /// CMYK converted to sRGB through a CMYK source profile.
    CmykToSrgb,
    /// Embedded profile converted to sRGB.
    EmbeddedToSrgb,
}

/// When the intermediate TIFF uses 64-bit offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BigTiffPolicy {
    /// Always write BigTIFF.
    #[default]
    Always,
    /// Only when the uncompressed raster reaches 4 GiB.
    Threshold,
}

/// How one source is normalized.
///
/// Valid only against the header facts it was computed from; the
/// materializer re-checks the dimensions before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    /// True unless `transform_kind` is [`TransformKind::None`].
    pub needs_color_transform: bool,
    /// Transform to apply.
    pub transform_kind: TransformKind,
    /// Write the intermediate as BigTIFF.
    pub needs_big_tiff: bool,
    /// Width the plan was computed for.
    pub source_width: u32,
    /// Height the plan was computed for.
    pub source_height: u32,
}

/// Computes [`ConversionPlan`]s. Pure and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    big_tiff: BigTiffPolicy,
}

impl Planner {
    /// Planner with the default (always BigTIFF) policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the BigTIFF policy.
    pub fn with_big_tiff_policy(mut self, policy: BigTiffPolicy) -> Self {
        self.big_tiff = policy;
        self
    }

    /// Plans normalization for a source.
    ///
    /// CMYK always goes through a CMYK-to-sRGB transform. Any other
    /// embedded profile is normalized to sRGB. Everything else passes
    /// through.
    pub fn plan(&self, info: &ImageInfo) -> ConversionPlan {
        let transform_kind = if info.color == ColorInterpretation::Cmyk {
            TransformKind::CmykToSrgb
        } else if info.has_icc_profile() {
            TransformKind::EmbeddedToSrgb
        } else {
            TransformKind::None
        };

        let needs_big_tiff = match self.big_tiff {
            BigTiffPolicy::Always => true,
            BigTiffPolicy::Threshold => info.uncompressed_size() >= CLASSIC_TIFF_LIMIT,
        };

        let plan = ConversionPlan {
            needs_color_transform: transform_kind != TransformKind::None,
            transform_kind,
            needs_big_tiff,
            source_width: info.width,
            source_height: info.height,
        };
        tracing::debug!(?plan, "planned normalization");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jp2d_io::{Format, Orientation};

    fn info(color: ColorInterpretation, icc: bool) -> ImageInfo {
        ImageInfo {
            format: Format::Tiff,
            width: 400,
            height: 300,
            samples_per_pixel: 3,
            bits_per_sample: vec![8, 8, 8],
            color,
            icc_profile: icc.then(|| vec![0; 128]),
            orientation: Orientation::TopLeft,
            page_count: 1,
            file_size: 0,
        }
    }

    #[test]
    fn test_cmyk() {
        let plan = Planner::new().plan(&info(ColorInterpretation::Cmyk, false));
        assert_eq!(plan.transform_kind, TransformKind::CmykToSrgb);
        assert!(plan.needs_color_transform);

        // Embedded CMYK profile still plans a CMYK transform
        let plan = Planner::new().plan(&info(ColorInterpretation::Cmyk, true));
        assert_eq!(plan.transform_kind, TransformKind::CmykToSrgb);
    }

    #[test]
    fn test_embedded_profile() {
        for color in [ColorInterpretation::Srgb, ColorInterpretation::Grayscale, ColorInterpretation::Other] {
            let plan = Planner::new().plan(&info(color, true));
            assert_eq!(plan.transform_kind, TransformKind::EmbeddedToSrgb);
            assert!(plan.needs_color_transform);
        }
    }

    #[test]
    fn test_passthrough() {
        let plan = Planner::new().plan(&info(ColorInterpretation::Srgb, false));
        assert_eq!(plan.transform_kind, TransformKind::None);
        assert!(!plan.needs_color_transform);
        assert!(plan.needs_big_tiff);
        assert_eq!((plan.source_width, plan.source_height), (400, 300));
    }

    #[test]
    fn test_idempotent() {
        let planner = Planner::new();
        let source = info(ColorInterpretation::Grayscale, true);
        assert_eq!(planner.plan(&source), planner.plan(&source));
    }

    #[test]
    fn test_threshold_policy() {
        let planner = Planner::new().with_big_tiff_policy(BigTiffPolicy::Threshold);
        assert!(!planner.plan(&info(ColorInterpretation::Srgb, false)).needs_big_tiff);

        // 3 * 40000 * 40000 bytes is past 4 GiB
        let mut big = info(ColorInterpretation::Srgb, false);
        big.width = 40_000;
        big.height = 40_000;
        assert!(planner.plan(&big).needs_big_tiff);

        // Exactly 2^32 bytes
        let mut edge = info(ColorInterpretation::Grayscale, false);
        edge.samples_per_pixel = 1;
        edge.bits_per_sample = vec![8];
        edge.width = 65_536;
        edge.height = 65_536;
        assert!(planner.plan(&edge).needs_big_tiff);
        edge.height -= 1;
        assert!(!planner.plan(&edge).needs_big_tiff);
    }
}
