//! Standard ICC profile definitions.

use crate::{IccError, IccResult, Profile};
use lcms2::{CIExyY, CIExyYTRIPLE, Profile as LcmsProfile, ToneCurve};
use std::fmt;
use std::str::FromStr;

/// Generic CMYK printer profile (ICC v4, CMYK to Lab CLUT).
///
/// A SWOP-like ink model on coated paper, freely redistributable. Used for
/// CMYK sources that carry no profile of their own.
const GENERIC_CMYK_ICC: &[u8] = include_bytes!("../profiles/generic-cmyk.icc");

/// Built-in profiles.
///
/// sRGB is the normalization target; the others describe sources commonly
/// found in digitization output. Names parse case-insensitively with
/// punctuation ignored, so `"Adobe RGB 1998"` and `adobergb` both work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardProfile {
    /// IEC 61966-2-1 sRGB.
    Srgb,
    /// Adobe RGB (1998).
    AdobeRgb,
    /// Display P3 (Apple), gamma 2.2 approximation.
    DisplayP3,
    /// D50 gray, gamma 2.2.
    Gray22,
    /// Generic coated CMYK, the default for untagged CMYK sources.
    GenericCmyk,
}

impl StandardProfile {
    /// Creates an ICC profile from this standard.
    pub fn to_profile(self) -> IccResult<Profile> {
        let inner = match self {
            StandardProfile::Srgb => LcmsProfile::new_srgb(),
            StandardProfile::AdobeRgb => {
                let primaries = CIExyYTRIPLE {
                    Red: CIExyY { x: 0.6400, y: 0.3300, Y: 1.0 },
                    Green: CIExyY { x: 0.2100, y: 0.7100, Y: 1.0 },
                    Blue: CIExyY { x: 0.1500, y: 0.0600, Y: 1.0 },
                };
                rgb(&primaries, 2.2)?
            }
            StandardProfile::DisplayP3 => {
                let primaries = CIExyYTRIPLE {
                    Red: CIExyY { x: 0.680, y: 0.320, Y: 1.0 },
                    Green: CIExyY { x: 0.265, y: 0.690, Y: 1.0 },
                    Blue: CIExyY { x: 0.150, y: 0.060, Y: 1.0 },
                };
                rgb(&primaries, 2.2)?
            }
            StandardProfile::Gray22 => return Profile::gray(2.2),
            StandardProfile::GenericCmyk => return Profile::from_icc(GENERIC_CMYK_ICC),
        };
        Ok(Profile { inner })
    }

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            StandardProfile::Srgb => "srgb",
            StandardProfile::AdobeRgb => "adobe-rgb",
            StandardProfile::DisplayP3 => "display-p3",
            StandardProfile::Gray22 => "gray22",
            StandardProfile::GenericCmyk => "generic-cmyk",
        }
    }
}

impl fmt::Display for StandardProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StandardProfile {
    type Err = IccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "srgb" | "srgbiec6196621" => Ok(StandardProfile::Srgb),
            "adobergb" | "adobergb1998" => Ok(StandardProfile::AdobeRgb),
            "displayp3" | "p3" => Ok(StandardProfile::DisplayP3),
            "gray22" | "graygamma22" => Ok(StandardProfile::Gray22),
            "genericcmyk" | "cmyk" => Ok(StandardProfile::GenericCmyk),
            _ => Err(IccError::UnknownProfile(s.to_string())),
        }
    }
}

fn rgb(primaries: &CIExyYTRIPLE, gamma: f64) -> IccResult<LcmsProfile> {
    let curve = ToneCurve::new(gamma);
    let curves = [&curve, &curve, &curve];
    LcmsProfile::new_rgb(&d65_white(), primaries, &curves).map_err(|e| IccError::CreateFailed(e.to_string()))
}

/// D65 white point.
fn d65_white() -> CIExyY {
    CIExyY { x: 0.3127, y: 0.3290, Y: 1.0 }
}
