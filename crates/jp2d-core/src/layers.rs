//! Resolution layer calculation.

use serde::Serialize;

/// Edge length, in pixels, the smallest resolution level approximates.
pub const REFERENCE_EDGE: u64 = 96;

/// Number of JP2 resolution layers for an image.
///
/// `ceil(log2(max(w, h)) - log2(96)) + 1`, evaluated in integers: one more
/// than the number of halvings needed to bring the longest edge down to
/// 96 pixels. Images whose longest edge is 96 or less (including zero)
/// get one layer.
pub fn layers(width: u32, height: u32) -> u32 {
    let edge = u64::from(width.max(height));
    let mut halvings = 0;
    while REFERENCE_EDGE << halvings < edge {
        halvings += 1;
    }
    halvings + 1
}

/// Parameters passed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncoderParameters {
    /// Value of `Clayers`, at least 1.
    pub resolution_layers: u32,
    /// Emit `-jp2_space sRGB`.
    pub force_srgb_space_flag: bool,
}

impl EncoderParameters {
    /// Parameters for an intermediate of the given size and layout.
    pub fn new(width: u32, height: u32, srgb: bool) -> Self {
        Self {
            resolution_layers: layers(width, height),
            force_srgb_space_flag: srgb,
        }
    }
}
