//! Morphological cleanup of a raw segmentation into the hard mask.
//!
//! 1. Closing merges small gaps between brush strokes.
//! 2. Opening removes isolated speckles.
//! 3. Feathering blurs the cleaned mask and cuts it at a low threshold,
//!    giving a smooth boundary instead of a stair-stepped raw edge.
//! 4. An optional trunk pass repeats the blur-then-cut on the already
//!    cleaned mask with a smaller radius and a higher threshold.
//!
//! Closing and opening use a 5×5 square structuring element; `n`
//! iterations of a 5×5 square are equivalent to one pass with a
//! `(4n+1)`-wide square, which is what the `imageproc` L∞ morphology
//! computes for `k = 2n`.
//!
//! Every step returns a [`BinaryMask`], so no gray values escape.

use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, HardMask};

/// Half-width of the square structuring element (5×5).
const SQUARE_RADIUS: u32 = 2;

/// Cleanup parameters for [`refine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Closing iterations with the 5×5 square. Counts above
    /// [`RefineConfig::MAX_ITERATIONS`] are clamped.
    pub close_iterations: u8,
    /// Opening iterations with the 5×5 square, clamped like
    /// `close_iterations`.
    pub open_iterations: u8,
    /// Gaussian sigma for edge feathering. Non-positive disables the blur.
    pub feather_radius: f32,
    /// Rebinarization threshold after feathering (inclusive).
    pub feather_threshold: u8,
    /// Gaussian sigma for the trunk-base pass. Non-positive disables it.
    pub trunk_feather_radius: f32,
    /// Rebinarization threshold after the trunk pass (inclusive).
    pub trunk_threshold: u8,
}

impl RefineConfig {
    /// Largest iteration count the square kernel can express.
    pub const MAX_ITERATIONS: u8 = 127;
    /// Default closing iterations.
    pub const DEFAULT_CLOSE_ITERATIONS: u8 = 2;
    /// Default opening iterations.
    pub const DEFAULT_OPEN_ITERATIONS: u8 = 1;
    /// Default feather sigma in pixels.
    pub const DEFAULT_FEATHER_RADIUS: f32 = 1.5;
    /// Default feather cut.
    pub const DEFAULT_FEATHER_THRESHOLD: u8 = 16;
    /// Default trunk-base sigma in pixels.
    pub const DEFAULT_TRUNK_FEATHER_RADIUS: f32 = 2.0;
    /// Default trunk-base cut.
    pub const DEFAULT_TRUNK_THRESHOLD: u8 = 64;
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            close_iterations: Self::DEFAULT_CLOSE_ITERATIONS,
            open_iterations: Self::DEFAULT_OPEN_ITERATIONS,
            feather_radius: Self::DEFAULT_FEATHER_RADIUS,
            feather_threshold: Self::DEFAULT_FEATHER_THRESHOLD,
            trunk_feather_radius: Self::DEFAULT_TRUNK_FEATHER_RADIUS,
            trunk_threshold: Self::DEFAULT_TRUNK_THRESHOLD,
        }
    }
}

/// L∞ radius equivalent to `iterations` passes of the 5×5 square.
fn square_radius(iterations: u8) -> u8 {
    u8::try_from(u32::from(iterations) * SQUARE_RADIUS).unwrap_or_else(|_| {
        tracing::warn!(
            iterations,
            max = RefineConfig::MAX_ITERATIONS,
            "morphology iterations clamped"
        );
        u8::MAX
    })
}

/// Morphological closing (dilate, then erode).
#[must_use = "returns the closed mask"]
pub fn close(mask: &BinaryMask, iterations: u8) -> BinaryMask {
    if iterations == 0 {
        return mask.clone();
    }
    let closed =
        imageproc::morphology::close(mask.as_image(), Norm::LInf, square_radius(iterations));
    BinaryMask::nonzero(&closed)
}

/// Morphological opening (erode, then dilate).
#[must_use = "returns the opened mask"]
pub fn open(mask: &BinaryMask, iterations: u8) -> BinaryMask {
    if iterations == 0 {
        return mask.clone();
    }
    let opened =
        imageproc::morphology::open(mask.as_image(), Norm::LInf, square_radius(iterations));
    BinaryMask::nonzero(&opened)
}

/// Blur a mask and cut it back to binary at `threshold`.
///
/// Non-positive `sigma` returns the mask unchanged, since
/// `imageproc`'s blur panics on `sigma <= 0.0`.
#[must_use = "returns the feathered mask"]
pub fn feather(mask: &BinaryMask, sigma: f32, threshold: u8) -> BinaryMask {
    if sigma <= 0.0 {
        return mask.clone();
    }
    let blurred = imageproc::filter::gaussian_blur_f32(mask.as_image(), sigma);
    BinaryMask::threshold(&blurred, threshold)
}

/// Soften the trunk/base boundary of an already cleaned mask.
#[must_use = "returns the softened hard mask"]
pub fn soften_trunk(hard: &HardMask, sigma: f32, threshold: u8) -> HardMask {
    HardMask::new(feather(hard, sigma, threshold))
}

/// Clean a raw segmentation into the canonical hard mask.
///
/// A blank input stays blank: none of the steps can create
/// foreground from nothing.
#[must_use = "returns the hard mask"]
pub fn refine(raw: &BinaryMask, config: &RefineConfig) -> HardMask {
    if raw.is_blank() {
        return HardMask::new(raw.clone());
    }
    let closed = close(raw, config.close_iterations);
    let opened = open(&closed, config.open_iterations);
    let feathered = feather(&opened, config.feather_radius, config.feather_threshold);
    let hard = HardMask::new(feathered);
    let hard = soften_trunk(&hard, config.trunk_feather_radius, config.trunk_threshold);
    tracing::debug!(
        raw = raw.foreground_count(),
        hard = hard.foreground_count(),
        "refined annotation"
    );
    hard
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Dimensions, EDITABLE, PRESERVED};

    fn rect(dims: Dimensions, x0: u32, y0: u32, x1: u32, y1: u32) -> BinaryMask {
        BinaryMask::from_fn(dims, |x, y| (x0..x1).contains(&x) && (y0..y1).contains(&y))
    }

    fn assert_binary(mask: &BinaryMask) {
        for p in mask.as_image().pixels() {
            assert!(
                p.0[0] == EDITABLE || p.0[0] == PRESERVED,
                "found gray value {}",
                p.0[0]
            );
        }
    }

    #[test]
    fn closing_bridges_a_narrow_gap() {
        let dims = Dimensions::new(60, 30);
        // Two blocks separated by a 2-pixel gap at x = 28..30.
        let mask = rect(dims, 10, 10, 28, 20).union(&rect(dims, 30, 10, 50, 20));
        assert!(!mask.is_editable(29, 15));
        let closed = close(&mask, 1);
        assert!(closed.is_editable(29, 15));
        assert_binary(&closed);
    }

    #[test]
    fn iteration_counts_past_the_cap_are_clamped() {
        let max = RefineConfig::MAX_ITERATIONS;
        assert_eq!(square_radius(max), 254);
        assert_eq!(square_radius(max + 1), u8::MAX);
        assert_eq!(square_radius(u8::MAX), u8::MAX);
    }

    #[test]
    fn opening_removes_speckles() {
        let dims = Dimensions::new(40, 40);
        let mut mask = rect(dims, 10, 10, 30, 30);
        mask = mask.union(&rect(dims, 2, 2, 3, 3));
        let opened = open(&mask, 1);
        assert!(!opened.is_editable(2, 2), "single-pixel speckle should vanish");
        assert!(opened.is_editable(20, 20), "solid interior should survive");
    }

    #[test]
    fn zero_iterations_are_identity() {
        let mask = rect(Dimensions::new(10, 10), 2, 2, 5, 5);
        assert_eq!(close(&mask, 0), mask);
        assert_eq!(open(&mask, 0), mask);
    }

    #[test]
    fn feather_with_non_positive_sigma_is_identity() {
        let mask = rect(Dimensions::new(10, 10), 2, 2, 5, 5);
        assert_eq!(feather(&mask, 0.0, 16), mask);
        assert_eq!(feather(&mask, -1.0, 16), mask);
    }

    #[test]
    fn low_threshold_feather_grows_slightly() {
        let mask = rect(Dimensions::new(40, 40), 10, 10, 30, 30);
        let feathered = feather(&mask, 1.5, 16);
        assert_binary(&feathered);
        assert!(feathered.contains(&rect(Dimensions::new(40, 40), 11, 11, 29, 29)));
        assert!(feathered.foreground_count() >= mask.foreground_count());
    }

    #[test]
    fn refine_blank_stays_blank() {
        let raw = BinaryMask::empty(Dimensions::new(25, 25));
        let hard = refine(&raw, &RefineConfig::default());
        assert!(hard.is_blank());
    }

    #[test]
    fn refine_output_is_binary_and_keeps_core() {
        let dims = Dimensions::new(64, 64);
        let raw = rect(dims, 16, 16, 48, 48);
        let hard = refine(&raw, &RefineConfig::default());
        assert_binary(&hard);
        assert!(hard.contains(&rect(dims, 20, 20, 44, 44)));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RefineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RefineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
