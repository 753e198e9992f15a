//! Shared types for verdure mask derivation.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference mask
/// rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference decoded
/// overlays and base images without depending on `image` directly.
pub use image::RgbaImage;

/// Pixel value marking an editable pixel in every internal mask.
pub const EDITABLE: u8 = 255;

/// Pixel value marking a preserved pixel in every internal mask.
pub const PRESERVED: u8 = 0;

/// Threshold used whenever a mask is rebinarized after resampling.
pub const MIDPOINT_THRESHOLD: u8 = 128;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimension pair.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Dimensions {
    type Err = MaskError;

    /// Parse `"WIDTHxHEIGHT"`, e.g. `"1024x768"`. Both sides must be
    /// positive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MaskError::InvalidSize(s.to_owned());
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(width, height))
    }
}

/// A single-channel raster whose pixels are exactly [`EDITABLE`] or
/// [`PRESERVED`].
///
/// Every constructor rebinarizes, so a `BinaryMask` can never carry
/// gray values between derivation steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// An all-preserved mask of the given size.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self(GrayImage::new(dimensions.width, dimensions.height))
    }

    /// Rebinarize a grayscale raster: pixels `>= threshold` become
    /// editable, everything else preserved.
    #[must_use]
    pub fn threshold(gray: &GrayImage, threshold: u8) -> Self {
        Self(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            image::Luma([if gray.get_pixel(x, y).0[0] >= threshold {
                EDITABLE
            } else {
                PRESERVED
            }])
        }))
    }

    /// Treat any non-zero pixel as editable.
    ///
    /// Used for the outputs of `imageproc` morphology, which keeps the
    /// foreground value of its input but is not guaranteed to emit 255.
    #[must_use]
    pub fn nonzero(gray: &GrayImage) -> Self {
        Self::threshold(gray, 1)
    }

    /// Build a mask from a predicate evaluated per pixel.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut editable: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(
            dimensions.width,
            dimensions.height,
            |x, y| image::Luma([if editable(x, y) { EDITABLE } else { PRESERVED }]),
        ))
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Whether the pixel at `(x, y)` is editable.
    ///
    /// Out-of-bounds coordinates are preserved.
    #[must_use]
    pub fn is_editable(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] == EDITABLE
    }

    /// Number of editable pixels.
    #[must_use]
    pub fn foreground_count(&self) -> u64 {
        self.0.pixels().filter(|p| p.0[0] == EDITABLE).count() as u64
    }

    /// `true` when no pixel is editable.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.pixels().all(|p| p.0[0] == PRESERVED)
    }

    /// `true` when every editable pixel of `other` is editable here.
    ///
    /// Masks of different sizes never contain one another.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .0
                .pixels()
                .zip(other.0.pixels())
                .all(|(a, b)| b.0[0] == PRESERVED || a.0[0] == EDITABLE)
    }

    /// Pixel-wise union. `other` must have the same dimensions.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a || b)
    }

    /// Pixel-wise intersection. `other` must have the same dimensions.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a && b)
    }

    fn combine(&self, other: &Self, op: impl Fn(bool, bool) -> bool) -> Self {
        debug_assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "mask combination requires equal dimensions"
        );
        Self::from_fn(self.dimensions(), |x, y| {
            op(self.is_editable(x, y), other.is_editable(x, y))
        })
    }

    /// Borrow the underlying raster.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Consume the mask and return the underlying raster.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

/// The strict, unexpanded plantable footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardMask(BinaryMask);

impl HardMask {
    /// Wrap a binary mask as a hard mask.
    #[must_use]
    pub const fn new(mask: BinaryMask) -> Self {
        Self(mask)
    }

    /// Consume and return the inner mask.
    #[must_use]
    pub fn into_mask(self) -> BinaryMask {
        self.0
    }
}

impl Deref for HardMask {
    type Target = BinaryMask;

    fn deref(&self) -> &BinaryMask {
        &self.0
    }
}

/// A hard mask grown to allow canopy overlap.
///
/// Always a superset of the hard mask it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftMask(BinaryMask);

impl SoftMask {
    /// Wrap a binary mask as a soft mask.
    ///
    /// Callers are responsible for the superset relation; the
    /// canopy expansion model is the only producer in this crate.
    #[must_use]
    pub const fn new(mask: BinaryMask) -> Self {
        Self(mask)
    }

    /// Consume and return the inner mask.
    #[must_use]
    pub fn into_mask(self) -> BinaryMask {
        self.0
    }
}

impl Deref for SoftMask {
    type Target = BinaryMask;

    fn deref(&self) -> &BinaryMask {
        &self.0
    }
}

/// Errors that can occur while decoding, deriving, or encoding masks.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to encode a raster as PNG.
    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    /// A size string could not be parsed.
    #[error("invalid size {0:?}: expected WIDTHxHEIGHT")]
    InvalidSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(dims: Dimensions, x0: u32, y0: u32, side: u32) -> BinaryMask {
        BinaryMask::from_fn(dims, |x, y| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        })
    }

    #[test]
    fn threshold_produces_only_binary_values() {
        let gray = GrayImage::from_fn(16, 1, |x, _| {
            image::Luma([u8::try_from(x * 16).unwrap_or(u8::MAX)])
        });
        let mask = BinaryMask::threshold(&gray, 128);
        for p in mask.as_image().pixels() {
            assert!(p.0[0] == EDITABLE || p.0[0] == PRESERVED);
        }
        assert_eq!(mask.foreground_count(), 8);
    }

    #[test]
    fn empty_mask_is_blank() {
        let mask = BinaryMask::empty(Dimensions::new(7, 3));
        assert!(mask.is_blank());
        assert_eq!(mask.dimensions(), Dimensions::new(7, 3));
    }

    #[test]
    fn union_contains_both_operands() {
        let dims = Dimensions::new(20, 20);
        let a = square(dims, 0, 0, 5);
        let b = square(dims, 10, 10, 5);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.foreground_count(), 50);
    }

    #[test]
    fn intersection_of_disjoint_squares_is_blank() {
        let dims = Dimensions::new(20, 20);
        let a = square(dims, 0, 0, 5);
        let b = square(dims, 10, 10, 5);
        assert!(a.intersection(&b).is_blank());
    }

    #[test]
    fn contains_rejects_different_dimensions() {
        let a = BinaryMask::empty(Dimensions::new(4, 4));
        let b = BinaryMask::empty(Dimensions::new(4, 5));
        assert!(!a.contains(&b));
    }

    #[test]
    fn out_of_bounds_is_preserved() {
        let mask = BinaryMask::from_fn(Dimensions::new(2, 2), |_, _| true);
        assert!(mask.is_editable(1, 1));
        assert!(!mask.is_editable(2, 0));
    }

    #[test]
    fn dimensions_display_as_size_string() {
        assert_eq!(Dimensions::new(1024, 768).to_string(), "1024x768");
    }

    #[test]
    fn dimensions_parse_from_size_string() {
        assert_eq!("1536x1024".parse::<Dimensions>().ok(), Some(Dimensions::new(1536, 1024)));
        assert_eq!(" 8X4 ".parse::<Dimensions>().ok(), Some(Dimensions::new(8, 4)));
        for bad in ["", "1024", "0x10", "axb", "10x-1"] {
            assert!(
                matches!(bad.parse::<Dimensions>(), Err(MaskError::InvalidSize(_))),
                "{bad:?} should not parse"
            );
        }
    }
}
