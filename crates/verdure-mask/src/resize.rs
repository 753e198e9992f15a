//! Mask size normalization.
//!
//! A mask handed to an edit call must match the raster it pairs with
//! pixel for pixel. Resampling is nearest-neighbor only; smoothing
//! filters would reintroduce gray values. The result is rebinarized at
//! the midpoint regardless, so the output is always exactly binary.

use image::imageops::FilterType;

use crate::types::{BinaryMask, Dimensions, MIDPOINT_THRESHOLD};

/// Resize `mask` to exactly `target` with nearest-neighbor sampling.
///
/// A mask already at `target` is returned unchanged, which makes
/// normalization idempotent.
#[must_use = "returns the resized mask"]
pub fn resize_nearest(mask: &BinaryMask, target: Dimensions) -> BinaryMask {
    if mask.dimensions() == target {
        return mask.clone();
    }
    let resized = image::imageops::resize(
        mask.as_image(),
        target.width,
        target.height,
        FilterType::Nearest,
    );
    tracing::debug!(from = %mask.dimensions(), to = %target, "normalized mask size");
    BinaryMask::threshold(&resized, MIDPOINT_THRESHOLD)
}

/// Normalize `mask` to the paired image's size, if one is known.
///
/// With no target the mask keeps its native resolution and the caller
/// is responsible for matching sizes.
#[must_use = "returns the normalized mask"]
pub fn fit(mask: &BinaryMask, target: Option<Dimensions>) -> BinaryMask {
    match target {
        Some(target) => resize_nearest(mask, target),
        None => mask.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EDITABLE, PRESERVED};

    fn checker(dims: Dimensions) -> BinaryMask {
        BinaryMask::from_fn(dims, |x, y| (x / 3 + y / 3) % 2 == 0)
    }

    #[test]
    fn output_matches_target_exactly_and_stays_binary() {
        let mask = checker(Dimensions::new(37, 21));
        for target in [
            Dimensions::new(100, 50),
            Dimensions::new(5, 9),
            Dimensions::new(1, 1),
            Dimensions::new(37, 64),
        ] {
            let out = resize_nearest(&mask, target);
            assert_eq!(out.dimensions(), target);
            assert!(
                out.as_image()
                    .pixels()
                    .all(|p| p.0[0] == EDITABLE || p.0[0] == PRESERVED)
            );
        }
    }

    #[test]
    fn normalizing_twice_is_bit_identical() {
        let target = Dimensions::new(64, 48);
        let once = resize_nearest(&checker(Dimensions::new(30, 30)), target);
        let twice = resize_nearest(&once, target);
        assert_eq!(once, twice);
    }

    #[test]
    fn upscale_by_integer_factor_replicates_pixels() {
        let mask = BinaryMask::from_fn(Dimensions::new(2, 1), |x, _| x == 1);
        let out = resize_nearest(&mask, Dimensions::new(4, 2));
        assert!(!out.is_editable(0, 0));
        assert!(!out.is_editable(1, 1));
        assert!(out.is_editable(2, 0));
        assert!(out.is_editable(3, 1));
    }

    #[test]
    fn missing_target_skips_normalization() {
        let mask = checker(Dimensions::new(13, 7));
        assert_eq!(fit(&mask, None), mask);
    }
}
