//! Canopy expansion: hard mask to soft mask.
//!
//! Trees planted inside a bed have crowns that overlap whatever is
//! behind and above them. The soft mask models that with three
//! dilations of the hard mask:
//!
//! 1. **Vertical**: a 3-pixel-wide column anchored at its bottom row,
//!    `2·up + 1` tall. Every bed pixel reaches `2·up` pixels upward and
//!    one pixel sideways.
//! 2. **Radial**: a Euclidean disk of radius `radial` for even frond
//!    spread in every direction.
//! 3. **Downward limiter**: the union of (1) and (2) is intersected with
//!    a keep region: the hard mask dilated by a rectangle that reaches as
//!    far up and sideways as (1) and (2) do, but only `down_limit` pixels
//!    down. Each bed is capped by its own lower boundary, so growth cannot
//!    spill onto paving under the bed line, even when another bed lies
//!    lower in the same columns.
//!
//! Dilation is monotone and every kernel contains its origin, so the
//! result always contains the hard mask.

use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Dimensions, HardMask, SoftMask};

/// Growth allowances in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanopyGrowth {
    /// Vertical allowance `V`; the column kernel is `2V + 1` tall.
    pub up_px: u32,
    /// Radial allowance `R`. The disk kernel is capped at
    /// [`CanopyGrowth::MAX_RADIAL_PX`].
    pub radial_px: u32,
    /// Maximum growth below the bed's lower boundary. Zero disables the
    /// limiter, leaving only the radial spread below the bed.
    pub down_limit_px: u32,
}

impl CanopyGrowth {
    /// Largest radial allowance the disk dilation supports.
    pub const MAX_RADIAL_PX: u32 = 255;

    /// Tight allowances for the layout stage: layout fidelity over
    /// canopy freedom.
    pub const LAYOUT: Self = Self::new(20, 4, 6);
    /// General-purpose allowances for standalone mask derivation.
    pub const STANDARD: Self = Self::new(80, 12, 8);
    /// Wide allowances for a gentle harmonization pass.
    pub const HARMONIZE: Self = Self::new(120, 24, 12);

    /// Create a growth triple.
    #[must_use]
    pub const fn new(up_px: u32, radial_px: u32, down_limit_px: u32) -> Self {
        Self {
            up_px,
            radial_px,
            down_limit_px,
        }
    }
}

impl Default for CanopyGrowth {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// How far a rectangular structuring element reaches from its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reach {
    left: u32,
    right: u32,
    up: u32,
    down: u32,
}

/// `out[i]` is set when any `line[j]` with `i - before <= j <= i + after`
/// is set.
fn window_any(line: &[bool], before: u32, after: u32) -> Vec<bool> {
    let n = line.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0_u32);
    for (i, &on) in line.iter().enumerate() {
        prefix.push(prefix[i] + u32::from(on));
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before as usize);
            let hi = i.saturating_add(after as usize).saturating_add(1).min(n);
            prefix[hi] > prefix[lo]
        })
        .collect()
}

/// Dilate with an arbitrary axis-aligned rectangle.
///
/// Written as two separable running-window passes, since `imageproc`
/// structuring masks are limited in size and always centered.
fn dilate_rect(mask: &BinaryMask, reach: Reach) -> BinaryMask {
    let Dimensions { width, height } = mask.dimensions();
    let (w, h) = (width as usize, height as usize);

    // A source pixel at column sx lights columns sx - left ..= sx + right,
    // so target column x looks at sources x - right ..= x + left.
    let mut rows = vec![false; w * h];
    for y in 0..height {
        let line: Vec<bool> = (0..width).map(|x| mask.is_editable(x, y)).collect();
        let spread = window_any(&line, reach.right, reach.left);
        rows[y as usize * w..(y as usize + 1) * w].copy_from_slice(&spread);
    }

    // Same reasoning vertically: target row y looks at y - down ..= y + up.
    let mut out = vec![false; w * h];
    for x in 0..w {
        let column: Vec<bool> = (0..h).map(|y| rows[y * w + x]).collect();
        for (y, on) in window_any(&column, reach.down, reach.up)
            .into_iter()
            .enumerate()
        {
            out[y * w + x] = on;
        }
    }

    BinaryMask::from_fn(mask.dimensions(), |x, y| out[y as usize * w + x as usize])
}

/// Upward column dilation: `2·up` pixels up, one pixel sideways.
#[must_use]
pub fn vertical_pass(hard: &BinaryMask, up_px: u32) -> BinaryMask {
    dilate_rect(
        hard,
        Reach {
            left: 1,
            right: 1,
            up: up_px.saturating_mul(2),
            down: 0,
        },
    )
}

/// Euclidean disk dilation of radius `radial_px`, at least one pixel and
/// at most [`CanopyGrowth::MAX_RADIAL_PX`].
#[must_use]
pub fn radial_pass(hard: &BinaryMask, radial_px: u32) -> BinaryMask {
    let k = u8::try_from(radial_px.max(1)).unwrap_or_else(|_| {
        tracing::warn!(
            radial_px,
            max = CanopyGrowth::MAX_RADIAL_PX,
            "radial growth clamped"
        );
        u8::MAX
    });
    BinaryMask::nonzero(&imageproc::morphology::dilate(
        hard.as_image(),
        Norm::L2,
        k,
    ))
}

/// The region growth is allowed to occupy: the full upward and lateral
/// reach of the other passes around each bed pixel, but at most
/// `down_limit_px` below it.
#[must_use]
pub fn keep_region(hard: &BinaryMask, growth: CanopyGrowth) -> BinaryMask {
    let lateral = growth.radial_px.max(1);
    dilate_rect(
        hard,
        Reach {
            left: lateral,
            right: lateral,
            up: growth.up_px.saturating_mul(2).max(lateral),
            down: growth.down_limit_px,
        },
    )
}

/// Derive the soft mask from a hard mask.
#[must_use = "returns the soft mask"]
pub fn expand(hard: &HardMask, growth: CanopyGrowth) -> SoftMask {
    if hard.is_blank() {
        return SoftMask::new((**hard).clone());
    }

    let vertical = vertical_pass(hard, growth.up_px);
    let radial = radial_pass(hard, growth.radial_px);
    let mut expanded = vertical.union(&radial);

    if growth.down_limit_px > 0 {
        expanded = expanded.intersection(&keep_region(hard, growth));
    }

    debug_assert!(expanded.contains(hard), "soft mask must contain hard mask");
    tracing::debug!(
        hard = hard.foreground_count(),
        soft = expanded.foreground_count(),
        up = growth.up_px,
        radial = growth.radial_px,
        down = growth.down_limit_px,
        "expanded canopy"
    );
    SoftMask::new(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(dims: Dimensions, x0: u32, y0: u32, x1: u32, y1: u32) -> HardMask {
        HardMask::new(BinaryMask::from_fn(dims, |x, y| {
            (x0..x1).contains(&x) && (y0..y1).contains(&y)
        }))
    }

    fn rows_with_foreground(mask: &BinaryMask) -> (u32, u32) {
        let rows: Vec<u32> = (0..mask.height())
            .filter(|&y| (0..mask.width()).any(|x| mask.is_editable(x, y)))
            .collect();
        (rows[0], rows[rows.len() - 1])
    }

    #[test]
    fn window_any_respects_before_and_after() {
        let line = [false, false, true, false, false, false];
        assert_eq!(
            window_any(&line, 1, 2),
            vec![true, true, true, true, false, false]
        );
    }

    #[test]
    fn vertical_pass_only_grows_upward() {
        let dims = Dimensions::new(30, 60);
        let hard = rect(dims, 10, 40, 20, 45);
        let v = vertical_pass(&hard, 10);
        assert_eq!(rows_with_foreground(&v), (20, 44));
        assert!(v.is_editable(9, 42));
        assert!(!v.is_editable(8, 42));
    }

    #[test]
    fn soft_contains_hard() {
        let dims = Dimensions::new(80, 80);
        let hard = rect(dims, 30, 50, 50, 60);
        for growth in [CanopyGrowth::LAYOUT, CanopyGrowth::STANDARD, CanopyGrowth::HARMONIZE] {
            let soft = expand(&hard, growth);
            assert!(soft.contains(&hard), "{growth:?} lost hard pixels");
        }
    }

    #[test]
    fn layout_growth_extends_up_and_caps_down() {
        let dims = Dimensions::new(120, 120);
        let hard = rect(dims, 40, 60, 60, 80);
        let soft = expand(&hard, CanopyGrowth::new(20, 4, 6));
        let (top, bottom) = rows_with_foreground(&soft);
        assert_eq!(top, 20, "expected 2 x 20 px of upward growth");
        assert!(bottom > 79 && bottom <= 79 + 6, "bottom row {bottom}");
    }

    #[test]
    fn down_limit_clips_radial_spread_below_bed() {
        let dims = Dimensions::new(100, 100);
        let hard = rect(dims, 40, 40, 60, 50);
        let soft = expand(&hard, CanopyGrowth::new(5, 20, 3));
        let (_, bottom) = rows_with_foreground(&soft);
        assert_eq!(bottom, 49 + 3);
        // Sideways spread at bed level survives.
        assert!(soft.is_editable(25, 45));
    }

    #[test]
    fn each_bed_is_capped_by_its_own_floor() {
        // A far bed above a near planter in the same columns.
        let dims = Dimensions::new(100, 140);
        let hard = HardMask::new(BinaryMask::from_fn(dims, |x, y| {
            (40..60).contains(&x) && ((20..30).contains(&y) || (100..110).contains(&y))
        }));
        let soft = expand(&hard, CanopyGrowth::new(5, 12, 3));

        // Nothing between the upper bed's floor + 3 and the lower bed's
        // upward reach (2 x 5 = 10 vertical, 12 radial).
        for y in 33..88 {
            assert!(
                (0..100).all(|x| !soft.is_editable(x, y)),
                "row {y} is editable below the upper bed"
            );
        }
        assert!(soft.is_editable(50, 32));
        assert!(soft.is_editable(50, 88));
        let (_, bottom) = rows_with_foreground(&soft);
        assert_eq!(bottom, 109 + 3);
    }

    #[test]
    fn oversized_radial_growth_is_clamped() {
        let dims = Dimensions::new(8, 8);
        let hard = rect(dims, 3, 3, 5, 5);
        let soft = radial_pass(&hard, 10_000);
        assert_eq!(soft.foreground_count(), 64);
    }

    #[test]
    fn zero_down_limit_keeps_full_radial_spread() {
        let dims = Dimensions::new(100, 100);
        let hard = rect(dims, 40, 40, 60, 50);
        let soft = expand(&hard, CanopyGrowth::new(5, 10, 0));
        let (_, bottom) = rows_with_foreground(&soft);
        assert_eq!(bottom, 49 + 10);
    }

    #[test]
    fn blank_hard_gives_blank_soft() {
        let hard = HardMask::new(BinaryMask::empty(Dimensions::new(12, 12)));
        assert!(expand(&hard, CanopyGrowth::default()).is_blank());
    }

    #[test]
    fn growth_is_clamped_at_image_borders() {
        let dims = Dimensions::new(20, 20);
        let hard = rect(dims, 0, 0, 20, 3);
        let soft = expand(&hard, CanopyGrowth::HARMONIZE);
        assert_eq!(soft.dimensions(), dims);
        assert!(soft.contains(&hard));
    }
}
