//! Designer-facing mask preview.

use image::{Rgba, RgbaImage};

use crate::resize;
use crate::types::{BinaryMask, Dimensions};

/// Tint color blended over editable pixels.
pub const TINT_COLOR: [u8; 3] = [255, 0, 0];

/// Tint opacity out of 255.
pub const TINT_ALPHA: u8 = 120;

/// Blend translucent red over the editable region of `base`.
///
/// The mask is normalized to the base size first. Preserved pixels are
/// returned untouched; the output is fully opaque.
#[must_use]
pub fn tint(base: &RgbaImage, mask: &BinaryMask) -> RgbaImage {
    let mask = resize::fit(mask, Some(Dimensions::of(base)));
    let a = u32::from(TINT_ALPHA);
    RgbaImage::from_fn(base.width(), base.height(), |x, y| {
        let [r, g, b, _] = base.get_pixel(x, y).0;
        if !mask.is_editable(x, y) {
            return Rgba([r, g, b, 255]);
        }
        let mix = |under: u8, over: u8| {
            let v = (u32::from(over) * a + u32::from(under) * (255 - a) + 127) / 255;
            u8::try_from(v).unwrap_or(u8::MAX)
        };
        Rgba([
            mix(r, TINT_COLOR[0]),
            mix(g, TINT_COLOR[1]),
            mix(b, TINT_COLOR[2]),
            255,
        ])
    })
}
