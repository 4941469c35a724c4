//! # jp2d-icc
//!
//! ICC color management for JP2 derivative generation.
//!
//! Every source raster is normalized to sRGB before it reaches the JP2
//! encoder. This crate wraps Little CMS 2 for that step:
//!
//! - Load ICC profiles from files or embedded bytes
//! - Build the standard profiles the pipeline needs (sRGB, gray, and a
//!   generic CMYK profile for untagged CMYK sources)
//! - Transform whole [`ImageData`](jp2d_io::ImageData) buffers to sRGB,
//!   keeping bit depth and alpha
//!
//! # Example
//!
//! ```rust,no_run
//! use jp2d_icc::{Intent, Profile, convert_to_srgb};
//!
//! let image = jp2d_io::read("adobe-rgb.tif").unwrap();
//! let icc = image.metadata.icc_profile.clone().unwrap();
//! let source = Profile::from_icc(&icc).unwrap();
//! let srgb = convert_to_srgb(&image, &source, Intent::Perceptual).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod profile;
mod standard;
mod transform;

pub use error::{IccError, IccResult};
pub use profile::Profile;
pub use standard::StandardProfile;
pub use transform::{Transform, convert_to_srgb};

use serde::{Deserialize, Serialize};

/// Rendering intent for color transformations.
///
/// Determines how out-of-gamut colors are handled during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Compresses the entire source gamut to fit within the destination.
    /// Best for photographic images.
    #[default]
    Perceptual,

    /// Maps source white to destination white; in-gamut colors are exact,
    /// out-of-gamut colors are clipped.
    RelativeColorimetric,

    /// Maintains saturation at the expense of accuracy.
    Saturation,

    /// Colorimetric without white point adaptation.
    AbsoluteColorimetric,
}

impl From<Intent> for lcms2::Intent {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Perceptual => lcms2::Intent::Perceptual,
            Intent::RelativeColorimetric => lcms2::Intent::RelativeColorimetric,
            Intent::Saturation => lcms2::Intent::Saturation,
            Intent::AbsoluteColorimetric => lcms2::Intent::AbsoluteColorimetric,
        }
    }
}
