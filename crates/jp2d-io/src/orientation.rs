//! Image orientation as recorded by TIFF tag 274 and EXIF 0x0112.
//!
//! Values follow the TIFF 6.0 naming: the first word names where row 0
//! sits, the second where column 0 sits.

use serde::Serialize;

/// Orientation of the stored raster relative to the intended view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Orientation {
    /// 1: stored upright.
    #[default]
    TopLeft,
    /// 2: mirrored horizontally.
    TopRight,
    /// 3: rotated 180 degrees.
    BottomRight,
    /// 4: mirrored vertically.
    BottomLeft,
    /// 5: transposed.
    LeftTop,
    /// 6: needs a 90 degree clockwise rotation.
    RightTop,
    /// 7: transversed.
    RightBottom,
    /// 8: needs a 90 degree counter-clockwise rotation.
    LeftBottom,
}

impl Orientation {
    /// Maps a tag value to an orientation. Out-of-range values yield `None`.
    pub fn from_tag(value: u16) -> Option<Self> {
        Some(match value {
            1 => Orientation::TopLeft,
            2 => Orientation::TopRight,
            3 => Orientation::BottomRight,
            4 => Orientation::BottomLeft,
            5 => Orientation::LeftTop,
            6 => Orientation::RightTop,
            7 => Orientation::RightBottom,
            8 => Orientation::LeftBottom,
            _ => return None,
        })
    }

    /// Tag value of this orientation.
    pub fn tag(self) -> u16 {
        match self {
            Orientation::TopLeft => 1,
            Orientation::TopRight => 2,
            Orientation::BottomRight => 3,
            Orientation::BottomLeft => 4,
            Orientation::LeftTop => 5,
            Orientation::RightTop => 6,
            Orientation::RightBottom => 7,
            Orientation::LeftBottom => 8,
        }
    }

    /// Returns true if correcting this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::LeftTop
                | Orientation::RightTop
                | Orientation::RightBottom
                | Orientation::LeftBottom
        )
    }

    /// Re-maps interleaved pixels so the result is upright.
    ///
    /// Returns the new buffer and its `(width, height)`.
    pub fn apply<T: Copy>(self, src: &[T], width: u32, height: u32, channels: usize) -> (Vec<T>, u32, u32) {
        let (w, h) = (width as usize, height as usize);
        let (out_w, out_h) = if self.swaps_dimensions() { (h, w) } else { (w, h) };

        let mut out = Vec::with_capacity(src.len());
        for y in 0..out_h {
            for x in 0..out_w {
                let (sx, sy) = match self {
                    Orientation::TopLeft => (x, y),
                    Orientation::TopRight => (w - 1 - x, y),
                    Orientation::BottomRight => (w - 1 - x, h - 1 - y),
                    Orientation::BottomLeft => (x, h - 1 - y),
                    Orientation::LeftTop => (y, x),
                    Orientation::RightTop => (y, h - 1 - x),
                    Orientation::RightBottom => (w - 1 - y, h - 1 - x),
                    Orientation::LeftBottom => (w - 1 - y, x),
                };
                let i = (sy * w + sx) * channels;
                out.extend_from_slice(&src[i..i + channels]);
            }
        }

        (out, out_w as u32, out_h as u32)
    }
}
