//! Post-edit compositing against the pre-edit image.
//!
//! Edit services may repaint pixels outside the requested region, or
//! shift the overall color balance. These helpers restore the input
//! where it should not have changed. Both are optional; the stage
//! orchestrator only calls them through its post-processing hooks.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::resize;
use crate::types::{BinaryMask, Dimensions};

/// Resample `image` to `target` unless it already matches.
fn conform(image: &RgbaImage, target: Dimensions) -> RgbaImage {
    if Dimensions::of(image) == target {
        image.clone()
    } else {
        image::imageops::resize(image, target.width, target.height, FilterType::Triangle)
    }
}

/// Keep `base` outside the mask and `edited` inside it.
///
/// The output has the base's dimensions; the edited image and the mask
/// are conformed to it first.
#[must_use]
pub fn clamp_to_mask(base: &RgbaImage, edited: &RgbaImage, mask: &BinaryMask) -> RgbaImage {
    let dims = Dimensions::of(base);
    let edited = conform(edited, dims);
    let mask = resize::fit(mask, Some(dims));
    RgbaImage::from_fn(dims.width, dims.height, |x, y| {
        if mask.is_editable(x, y) {
            *edited.get_pixel(x, y)
        } else {
            *base.get_pixel(x, y)
        }
    })
}

/// Per-channel RGB mean over the pixels selected by `include`.
#[allow(clippy::cast_precision_loss)]
fn channel_means(image: &RgbaImage, include: impl Fn(u32, u32) -> bool) -> Option<[f64; 3]> {
    let mut sums = [0_u64; 3];
    let mut count = 0_u64;
    for (x, y, px) in image.enumerate_pixels() {
        if include(x, y) {
            for (sum, &c) in sums.iter_mut().zip(&px.0[..3]) {
                *sum += u64::from(c);
            }
            count += 1;
        }
    }
    (count > 0).then(|| sums.map(|s| s as f64 / count as f64))
}

/// Shift `edited`'s color balance so its preserved region matches
/// `reference`.
///
/// Means are computed over pixels the mask marks preserved (the whole
/// image when there is no mask, or when the mask covers everything),
/// and the per-channel difference is added to every output pixel.
/// Alpha is carried through from `edited`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn match_tone(reference: &RgbaImage, edited: &RgbaImage, mask: Option<&BinaryMask>) -> RgbaImage {
    let dims = Dimensions::of(edited);
    let reference = conform(reference, dims);
    let mask = mask.map(|m| resize::fit(m, Some(dims)));

    let preserved = |x: u32, y: u32| mask.as_ref().is_none_or(|m| !m.is_editable(x, y));
    let means = channel_means(&reference, preserved)
        .zip(channel_means(edited, preserved))
        .or_else(|| channel_means(&reference, |_, _| true).zip(channel_means(edited, |_, _| true)));

    let Some((want, have)) = means else {
        return edited.clone();
    };
    let shift = [want[0] - have[0], want[1] - have[1], want[2] - have[2]];
    tracing::debug!(r = shift[0], g = shift[1], b = shift[2], "tone shift");

    RgbaImage::from_fn(dims.width, dims.height, |x, y| {
        let [r, g, b, a] = edited.get_pixel(x, y).0;
        let adj = |c: u8, d: f64| (f64::from(c) + d).round().clamp(0.0, 255.0) as u8;
        Rgba([adj(r, shift[0]), adj(g, shift[1]), adj(b, shift[2]), a])
    })
}
